use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use iota_common::{DeviceIoError, PhysicalPort};

/// A controller board exposed as a directory tree:
///
/// ```text
/// <root>/digital/<pin>      "0" | "1"
/// <root>/analog/<channel>   0.0..=1.0
/// ```
///
/// A missing line file, an empty file or `na` reads as "no value".
///
/// Every call is a blocking `std::fs` access to one small file and runs inline
/// on the runtime thread holding the device lock. At one sample per poll
/// interval this is kept off `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct FileBoard {
    root: PathBuf,
}

impl FileBoard {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DeviceIoError> {
        let root = root.into();
        if !root.join("digital").is_dir() {
            return Err(DeviceIoError::BoardUnavailable(format!(
                "no digital lines under {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn digital_path(&self, pin: u8) -> PathBuf {
        self.root.join("digital").join(pin.to_string())
    }

    fn analog_path(&self, channel: u8) -> PathBuf {
        self.root.join("analog").join(channel.to_string())
    }
}

fn read_line(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() || value.eq_ignore_ascii_case("na") {
                Ok(None)
            } else {
                Ok(Some(value.to_string()))
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

impl PhysicalPort for FileBoard {
    fn read_digital(&mut self, pin: u8) -> Result<Option<bool>, DeviceIoError> {
        let fail = |reason: String| DeviceIoError::DigitalRead { pin, reason };
        let Some(value) = read_line(&self.digital_path(pin)).map_err(|err| fail(err.to_string()))? else {
            return Ok(None);
        };
        match value.as_str() {
            "1" | "high" => Ok(Some(true)),
            "0" | "low" => Ok(Some(false)),
            other => Err(fail(format!("unexpected level '{other}'"))),
        }
    }

    fn write_digital(&mut self, pin: u8, level: bool) -> Result<(), DeviceIoError> {
        let payload = if level { "1\n" } else { "0\n" };
        fs::write(self.digital_path(pin), payload).map_err(|err| DeviceIoError::DigitalWrite {
            pin,
            reason: err.to_string(),
        })
    }

    fn read_analog(&mut self, channel: u8) -> Result<Option<f32>, DeviceIoError> {
        let fail = |reason: String| DeviceIoError::AnalogRead { channel, reason };
        let Some(value) = read_line(&self.analog_path(channel)).map_err(|err| fail(err.to_string()))? else {
            return Ok(None);
        };
        let parsed = value
            .parse::<f32>()
            .map_err(|err| fail(format!("'{value}': {err}")))?;
        if parsed.is_finite() {
            Ok(Some(parsed.clamp(0.0, 1.0)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_dir(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("iota-board-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("digital")).unwrap();
        fs::create_dir_all(root.join("analog")).unwrap();
        root
    }

    #[test]
    fn missing_board_is_unavailable() {
        let root = std::env::temp_dir().join("iota-board-does-not-exist");
        assert!(matches!(
            FileBoard::open(root),
            Err(DeviceIoError::BoardUnavailable(_))
        ));
    }

    #[test]
    fn reads_lines_and_normalizes_missing_values() {
        let root = board_dir("read");
        fs::write(root.join("digital/2"), "1\n").unwrap();
        fs::write(root.join("digital/3"), "na").unwrap();
        fs::write(root.join("analog/0"), "0.04").unwrap();
        fs::write(root.join("analog/1"), "").unwrap();
        let mut board = FileBoard::open(&root).unwrap();

        assert_eq!(board.read_digital(2), Ok(Some(true)));
        assert_eq!(board.read_digital(3), Ok(None));
        assert_eq!(board.read_digital(9), Ok(None));
        assert_eq!(board.read_analog(0), Ok(Some(0.04)));
        assert_eq!(board.read_analog(1), Ok(None));

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn garbage_is_an_io_error() {
        let root = board_dir("garbage");
        fs::write(root.join("digital/2"), "maybe").unwrap();
        fs::write(root.join("analog/0"), "warm").unwrap();
        let mut board = FileBoard::open(&root).unwrap();

        assert!(matches!(board.read_digital(2), Err(DeviceIoError::DigitalRead { pin: 2, .. })));
        assert!(matches!(board.read_analog(0), Err(DeviceIoError::AnalogRead { channel: 0, .. })));

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn writes_read_back() {
        let root = board_dir("write");
        let mut board = FileBoard::open(&root).unwrap();

        board.write_digital(7, false).unwrap();
        assert_eq!(board.read_digital(7), Ok(Some(false)));
        board.write_digital(7, true).unwrap();
        assert_eq!(fs::read_to_string(root.join("digital/7")).unwrap(), "1\n");

        fs::remove_dir_all(root).unwrap();
    }
}
