mod persistence;
mod pipeline;
mod session;
mod setup;
