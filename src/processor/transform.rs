//! Caller-supplied chunk transforms.

use crate::error::BoxError;
use crate::models::Frame;

/// A pure function from one chunk to its prepared form.
///
/// The pipeline treats the transform as opaque: it may add, remove or
/// rewrite columns and rows. Errors abort ingestion at the current chunk.
pub trait ChunkTransform {
    /// Name used in logs and `SimError::Transform`
    fn name(&self) -> &str;

    fn apply(&self, chunk: Frame) -> Result<Frame, BoxError>;
}

impl<F> ChunkTransform for F
where
    F: Fn(Frame) -> Result<Frame, BoxError>,
{
    fn name(&self) -> &str {
        std::any::type_name::<F>()
    }

    fn apply(&self, chunk: Frame) -> Result<Frame, BoxError> {
        self(chunk)
    }
}

/// Transform that returns every chunk unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ChunkTransform for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(&self, chunk: Frame) -> Result<Frame, BoxError> {
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    #[test]
    fn test_closure_transform() {
        let add_flag = |mut frame: Frame| -> Result<Frame, BoxError> {
            let flags = vec![Value::Integer(1); frame.len()];
            frame.set_column("flag", flags)?;
            Ok(frame)
        };

        let frame = Frame::with_rows(vec!["a".to_string()], vec![vec![Value::Integer(7)]]).unwrap();
        let out = add_flag.apply(frame).unwrap();
        assert_eq!(out.row(0).unwrap().get("flag"), Some(&Value::Integer(1)));
        assert!(!add_flag.name().is_empty());
    }

    #[test]
    fn test_identity() {
        let frame = Frame::new(vec!["a".to_string()]).unwrap();
        assert_eq!(Identity.apply(frame.clone()).unwrap(), frame);
    }
}
