//! Loop-back output plugin
//!
//! Default binding for unpatched universes. Written values are stored and
//! read straight back, so monitoring and blackout snapshots keep working
//! with no hardware attached.

use lux_core::{UNIVERSE_CHANNELS, UniverseBuffer};

use crate::error::{OutputError, OutputResult};
use crate::plugin::OutputPlugin;

/// Registry name of the built-in loop-back plugin
pub const DUMMY_PLUGIN_NAME: &str = "Dummy Output";

/// No-op loop-back plugin
pub struct DummyPlugin {
    lines: Vec<UniverseBuffer>,
}

impl DummyPlugin {
    /// Create a loop-back plugin exposing `line_count` output lines
    pub fn new(line_count: usize) -> Self {
        Self {
            lines: vec![UniverseBuffer::new(); line_count],
        }
    }

    fn line(&self, line: usize) -> OutputResult<&UniverseBuffer> {
        self.lines.get(line).ok_or_else(|| OutputError::InvalidLine {
            plugin: DUMMY_PLUGIN_NAME.to_string(),
            line,
        })
    }

    fn line_mut(&mut self, line: usize) -> OutputResult<&mut UniverseBuffer> {
        self.lines.get_mut(line).ok_or_else(|| OutputError::InvalidLine {
            plugin: DUMMY_PLUGIN_NAME.to_string(),
            line,
        })
    }

    fn check_channel(line: usize, channel: usize, len: usize) -> OutputResult<()> {
        if channel + len <= UNIVERSE_CHANNELS {
            Ok(())
        } else {
            Err(OutputError::ChannelOutOfRange { line, channel })
        }
    }
}

impl OutputPlugin for DummyPlugin {
    fn name(&self) -> &str {
        DUMMY_PLUGIN_NAME
    }

    fn outputs(&self) -> Vec<String> {
        (0..self.lines.len())
            .map(|i| format!("Loop-back {}", i + 1))
            .collect()
    }

    fn write_channel(&mut self, line: usize, channel: usize, value: u8) -> OutputResult<()> {
        Self::check_channel(line, channel, 1)?;
        self.line_mut(line)?.set(channel, value);
        Ok(())
    }

    fn write_range(&mut self, line: usize, channel: usize, values: &[u8]) -> OutputResult<()> {
        Self::check_channel(line, channel, values.len())?;
        self.line_mut(line)?.set_range(channel, values);
        Ok(())
    }

    fn read_channel(&self, line: usize, channel: usize) -> OutputResult<u8> {
        Self::check_channel(line, channel, 1)?;
        Ok(self.line(line)?.get(channel))
    }

    fn read_range(&self, line: usize, channel: usize, out: &mut [u8]) -> OutputResult<()> {
        Self::check_channel(line, channel, out.len())?;
        let buffer = self.line(line)?;
        out.copy_from_slice(&buffer.as_slice()[channel..channel + out.len()]);
        Ok(())
    }

    fn info_text(&self, line: Option<usize>) -> String {
        match line {
            Some(line) => format!("Loop-back line {} (no hardware attached)", line + 1),
            None => format!(
                "Loop-back output with {} lines; written values are readable back",
                self.lines.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_back() {
        let mut plugin = DummyPlugin::new(2);

        plugin.write_channel(1, 7, 42).unwrap();
        assert_eq!(plugin.read_channel(1, 7).unwrap(), 42);
        assert_eq!(plugin.read_channel(0, 7).unwrap(), 0);

        let mut out = [0u8; 3];
        plugin.write_range(0, 100, &[1, 2, 3]).unwrap();
        plugin.read_range(0, 100, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn test_invalid_line_and_channel() {
        let mut plugin = DummyPlugin::new(1);

        assert!(plugin.write_channel(1, 0, 1).is_err());
        assert!(plugin.write_channel(0, 512, 1).is_err());
        assert!(plugin.read_channel(0, 512).is_err());
        assert!(plugin.write_range(0, 510, &[0; 4]).is_err());
    }

    #[test]
    fn test_line_names() {
        let plugin = DummyPlugin::new(2);
        assert_eq!(plugin.outputs(), vec!["Loop-back 1", "Loop-back 2"]);
    }
}
