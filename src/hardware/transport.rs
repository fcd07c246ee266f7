//! Byte-stream transport trait

use crate::hardware::CommResult;

/// Raw byte access to the serial link the radio module sits on
///
/// Implementations must never block indefinitely: `recv` returns `Ok(0)`
/// when nothing is currently available, and `send` may accept fewer bytes
/// than offered (including zero). Waiting is the framer's job.
pub trait Transport {
    /// Offer bytes to the link, returning how many were accepted
    fn send(&mut self, data: &[u8]) -> CommResult<usize>;

    /// Copy currently available bytes into `buf`, returning how many
    fn recv(&mut self, buf: &mut [u8]) -> CommResult<usize>;

    /// Whether the module's connection-status signal reports a live link
    fn is_link_present(&mut self) -> bool;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, data: &[u8]) -> CommResult<usize> {
        (**self).send(data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> CommResult<usize> {
        (**self).recv(buf)
    }

    fn is_link_present(&mut self) -> bool {
        (**self).is_link_present()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> CommResult<usize> {
        (**self).send(data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> CommResult<usize> {
        (**self).recv(buf)
    }

    fn is_link_present(&mut self) -> bool {
        (**self).is_link_present()
    }
}
