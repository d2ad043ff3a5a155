//! Byte-based progress tracking.
//!
//! `ProgressReader` wraps any reader and reports cumulative bytes read after
//! each successful read, which for the statement stream means once per
//! buffer refill. Callers turn the byte count into a percentage against the
//! known file size.

use std::io::Read;

pub struct ProgressReader<'a, R: Read> {
    reader: R,
    callback: Box<dyn FnMut(u64) + 'a>,
    bytes_read: u64,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    pub fn new<F>(reader: R, callback: F) -> Self
    where
        F: FnMut(u64) + 'a,
    {
        Self {
            reader,
            callback: Box::new(callback),
            bytes_read: 0,
        }
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.bytes_read += n as u64;
        (self.callback)(self.bytes_read);
        Ok(n)
    }
}

/// Whole percentage of `bytes` against `total`, clamped to 100.
pub fn percent(bytes: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (bytes.saturating_mul(100) / total).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_cumulative_bytes() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();

        let data = vec![0u8; 10];
        let mut reader = ProgressReader::new(&data[..], move |bytes| {
            seen_clone.borrow_mut().push(bytes);
        });

        let mut buf = [0u8; 4];
        reader.read(&mut buf).unwrap();
        reader.read(&mut buf).unwrap();

        assert_eq!(*seen.borrow(), vec![4, 8]);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(100, 200), 50);
        assert_eq!(percent(250, 200), 100);
        assert_eq!(percent(5, 0), 100);
    }
}
