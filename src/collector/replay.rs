//! Recorded event source.
//!
//! Sessions are stored as JSON lines, one [`KeyEvent`] per line, e.g.
//! `{"key":{"code":4},"is_press":true,"timestamp":0.0}`.

use crate::collector::types::KeyEvent;
use std::io::BufRead;

/// Errors reading or scheduling a recorded session.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayError {
    Io(String),
    Parse { line: usize, message: String },
    InvalidStep(f64),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "Could not read recorded events: {e}"),
            ReplayError::Parse { line, message } => {
                write!(f, "Malformed event on line {line}: {message}")
            }
            ReplayError::InvalidStep(step) => {
                write!(f, "Sample step must be a positive number of seconds, got {step}")
            }
        }
    }
}

impl std::error::Error for ReplayError {}

/// Parse every event from a JSON-lines reader.
///
/// Blank lines are skipped. A malformed line fails the whole read and the
/// error carries its 1-based line number.
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<KeyEvent>, ReplayError> {
    let mut events = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ReplayError::Io(e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: KeyEvent = serde_json::from_str(trimmed).map_err(|e| ReplayError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;
        events.push(event);
    }

    Ok(events)
}

/// Evenly spaced sample times over recorded time.
///
/// Times are `origin + k * step` for integer `k`, so the schedule always
/// advances even where `step` is below the float spacing of the timestamps.
/// After a gap only the latest due time is reported.
#[derive(Debug, Clone)]
pub struct SampleSchedule {
    origin: f64,
    step: f64,
    next: u64,
}

impl SampleSchedule {
    /// First sample falls at `origin + step`.
    pub fn new(origin: f64, step: f64) -> Result<Self, ReplayError> {
        if !origin.is_finite() || !step.is_finite() || step <= 0.0 {
            return Err(ReplayError::InvalidStep(step));
        }
        Ok(Self {
            origin,
            step,
            next: 1,
        })
    }

    /// The latest unreported sample time at or before `t`.
    pub fn due(&mut self, t: f64) -> Option<f64> {
        let elapsed = (t - self.origin) / self.step;
        if elapsed.is_nan() || elapsed < self.next as f64 {
            return None;
        }

        // Float to integer casts saturate
        let k = (elapsed.floor() as u64).max(self.next);
        self.next = k.saturating_add(1);
        Some((self.origin + k as f64 * self.step).min(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::Key;
    use std::io::Cursor;

    #[test]
    fn test_read_events_skips_blank_lines() {
        let input = "{\"key\":{\"code\":4},\"is_press\":true,\"timestamp\":0.0}\n\
                     \n\
                     {\"key\":\"backspace\",\"is_press\":true,\"timestamp\":0.3}\n";
        let events = read_events(Cursor::new(input)).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], KeyEvent::press(Key::Code(4), 0.0));
        assert_eq!(events[1], KeyEvent::press(Key::Backspace, 0.3));
    }

    #[test]
    fn test_read_events_reports_line_number() {
        let input = "{\"key\":\"backspace\",\"is_press\":true,\"timestamp\":0.3}\nnot json\n";
        match read_events(Cursor::new(input)) {
            Err(ReplayError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_schedule_steady_events() {
        let mut schedule = SampleSchedule::new(0.0, 1.0).unwrap();
        let due: Vec<Option<f64>> = [0.5, 1.0, 1.5, 2.0, 2.5]
            .into_iter()
            .map(|t| schedule.due(t))
            .collect();
        assert_eq!(due, vec![None, Some(1.0), None, Some(2.0), None]);
    }

    #[test]
    fn test_schedule_reports_once_after_gap() {
        let mut schedule = SampleSchedule::new(0.0, 0.001).unwrap();
        let at = schedule.due(1000.0).unwrap();
        assert!(at > 999.99 && at <= 1000.0);
        assert_eq!(schedule.due(1000.0), None);
        assert!(schedule.due(1000.01).is_some());
    }

    #[test]
    fn test_schedule_advances_at_large_timestamps() {
        // Float spacing near 1e17 is 16, far coarser than the step
        let start = 1e17;
        let end = 1.000_000_000_000_000_16e17;
        let mut schedule = SampleSchedule::new(start, 1.0).unwrap();

        assert_eq!(schedule.due(end), Some(end));
        assert_eq!(schedule.due(end), None);
    }

    #[test]
    fn test_schedule_rejects_bad_steps() {
        for step in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                SampleSchedule::new(0.0, step),
                Err(ReplayError::InvalidStep(_))
            ));
        }
    }
}
