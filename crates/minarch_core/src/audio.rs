/// One interleaved stereo frame.
pub type StereoFrame = [i16; 2];

/// Linear interpolating stereo resampler.
///
/// Converts from the core's sample rate to the output device rate, stretched by a small resync ratio so audio keeps
/// pace with a display that runs slightly off the core's nominal frame rate.
#[derive(Debug, Clone)]
pub struct Resampler {
    input_rate: f64,
    output_rate: f64,
    ratio: f64,
    /// Input frames advanced per output frame.
    step: f64,
    /// Position between `prev` and the next input frame, in `[0, 1)`.
    pos: f64,
    prev: StereoFrame,
}

impl Resampler {
    pub fn new(input_rate: f64, output_rate: f64) -> Self {
        let mut resampler = Self {
            input_rate,
            output_rate,
            ratio: 1.0,
            step: 1.0,
            pos: 0.0,
            prev: [0, 0],
        };
        resampler.update_step();
        resampler
    }

    fn update_step(&mut self) {
        self.step = if self.output_rate > 0.0 && self.input_rate > 0.0 {
            self.input_rate * self.ratio / self.output_rate
        } else {
            1.0
        };
    }

    pub fn input_rate(&self) -> f64 {
        self.input_rate
    }

    pub fn output_rate(&self) -> f64 {
        self.output_rate
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Apply a resync correction, see [`crate::pacing::resync_ratio`].
    pub fn set_ratio(&mut self, ratio: f64) {
        if ratio > 0.0 && ratio != self.ratio {
            self.ratio = ratio;
            self.update_step();
        }
    }

    /// Rebuild for a core that changed its sample rate mid-game.
    pub fn reinit(&mut self, old_rate: f64, new_rate: f64, fps: f64) {
        log::info!(
            "Audio sample rate changed {:.0} Hz -> {:.0} Hz ({:.2} fps)",
            old_rate,
            new_rate,
            fps
        );
        *self = Self {
            ratio: self.ratio,
            ..Self::new(new_rate, self.output_rate)
        };
        self.update_step();
    }

    /// Resample interleaved `input`, passing every produced frame to `output`.
    ///
    /// A trailing odd sample is ignored. Returns the number of produced frames.
    pub fn process(&mut self, input: &[i16], mut output: impl FnMut(StereoFrame)) -> usize {
        let mut produced = 0;

        for frame in input.chunks_exact(2) {
            let current = [frame[0], frame[1]];

            while self.pos < 1.0 {
                let t = self.pos;
                let lerp = |a: i16, b: i16| (a as f64 + (b as f64 - a as f64) * t).round() as i16;
                output([lerp(self.prev[0], current[0]), lerp(self.prev[1], current[1])]);
                produced += 1;
                self.pos += self.step;
            }

            self.pos -= 1.0;
            self.prev = current;
        }

        produced
    }
}
