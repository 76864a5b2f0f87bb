use crossbeam::channel::{Receiver, RecvError, SendError, Sender, TryRecvError, TrySendError};

/// Create a pair of exchangers for handing large buffers between threads without reallocating.
///
/// Two buffers circulate: one held by the receiver as its most recent item, one in flight. A sender therefore never
/// gets more than one item ahead of its receiver.
pub fn exchangers<T: Clone>(first_item: T) -> (ExchangerSender<T>, ExchangerReceiver<T>) {
    let (sender, receiver) = crossbeam::channel::bounded(1);
    let (buffer_sender, buffer_receiver) = crossbeam::channel::bounded(1);
    // Fill the buffer channel to start the transactions.
    let _ = buffer_sender.send(first_item.clone());

    let exc_recv = ExchangerReceiver {
        item_receiver: receiver,
        buffer_sender,
        last_item: first_item,
    };

    let exc_send = ExchangerSender {
        item_sender: sender,
        buffer_receiver,
    };

    (exc_send, exc_recv)
}

pub struct ExchangerReceiver<T> {
    item_receiver: Receiver<T>,
    buffer_sender: Sender<T>,
    last_item: T,
}

impl<T> ExchangerReceiver<T> {
    pub fn recv(&mut self) -> Result<&mut T, RecvError> {
        let item = self.item_receiver.recv()?;
        let old_item = std::mem::replace(&mut self.last_item, item);
        // Send the old buffer back to the sender
        self.buffer_sender.send(old_item).map_err(|_| RecvError)?;

        Ok(&mut self.last_item)
    }

    pub fn try_recv(&mut self) -> Result<&mut T, TryRecvError> {
        let item = self.item_receiver.try_recv()?;
        let old_item = std::mem::replace(&mut self.last_item, item);
        self.buffer_sender
            .send(old_item)
            .map_err(|_| TryRecvError::Disconnected)?;

        Ok(&mut self.last_item)
    }

    pub fn most_recent_received(&self) -> &T {
        &self.last_item
    }

    /// Take a new item if one is waiting, else hand back the last one.
    ///
    /// Returns whether the item is new.
    pub fn try_recv_or_recent(&mut self) -> (bool, &mut T) {
        let fresh = self.try_recv().is_ok();
        (fresh, &mut self.last_item)
    }
}

pub struct ExchangerSender<T> {
    item_sender: Sender<T>,
    buffer_receiver: Receiver<T>,
}

impl<T> ExchangerSender<T> {
    /// Swap `item` for a spare buffer and send it, blocking until the receiver freed one up.
    pub fn send(&self, item: &mut T) -> Result<(), SendError<()>> {
        let old_buffer = self.buffer_receiver.recv().map_err(|_| SendError(()))?;
        let new_item = std::mem::replace(item, old_buffer);
        self.item_sender.send(new_item).map_err(|_| SendError(()))?;

        Ok(())
    }

    /// Like [`ExchangerSender::send`], but gives up with `Full` instead of waiting for the receiver.
    ///
    /// `item` is left untouched when nothing was sent.
    pub fn try_send(&self, item: &mut T) -> Result<(), TrySendError<()>> {
        let old_buffer = self.buffer_receiver.try_recv().map_err(|e| match e {
            TryRecvError::Empty => TrySendError::Full(()),
            TryRecvError::Disconnected => TrySendError::Disconnected(()),
        })?;
        let new_item = std::mem::replace(item, old_buffer);

        // With the spare buffer in hand the item slot is always free.
        self.item_sender.try_send(new_item).map_err(|e| match e {
            TrySendError::Full(_) => TrySendError::Full(()),
            TrySendError::Disconnected(_) => TrySendError::Disconnected(()),
        })?;

        Ok(())
    }
}
