use dongle_common::{EmptyPayload, OnFailure, SendConfig, DEFAULT_CHUNK_SIZE};
use std::path::PathBuf;
use std::time::Duration;

fn chunk_size_in_range(s: &str) -> Result<usize, String> {
    clap_num::number_range(s, 1, usize::from(u16::MAX))
}

#[derive(clap::Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /* Device settings
     */
    /// Serial device bridging to the dongle; will try to autodetect if not specified
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Baud rate of the serial bridge
    #[arg(short, long, default_value_t = 115200)]
    pub baud: u32,

    /// How long to wait for the device to answer each frame, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Print frames and reassemble them locally instead of talking to a device
    #[arg(long, conflicts_with = "device")]
    pub dry_run: bool,

    /* Framing
     */
    /// Instruction code put in every frame header
    #[arg(short, long, default_value_t = 1, value_parser = clap_num::maybe_hex::<u8>)]
    pub instruction: u8,

    /// Maximum number of payload bytes per frame
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = chunk_size_in_range)]
    pub chunk_size: usize,

    /// What to send when the payload is empty
    #[arg(long, default_value_t)]
    pub empty_payload: EmptyPayload,

    /// Whether to keep sending after a chunk fails
    #[arg(long, default_value_t)]
    pub on_failure: OnFailure,

    /* Output
     */
    /// Increase message verbosity (-v logs every frame sent as hex, -vv also the responses)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Silence all output but errors
    #[arg(short, long)]
    pub quiet: bool,

    /* Payload
     */
    /// Send this text instead of reading a file
    #[arg(short, long, conflicts_with = "input")]
    pub text: Option<String>,

    /// File holding the payload; `-` reads from stdin
    #[arg(required_unless_present = "text")]
    pub input: Option<PathBuf>,
}

impl Args {
    pub fn send_config(&self) -> SendConfig {
        SendConfig::default()
            .with_chunk_size(self.chunk_size)
            .with_empty_payload(self.empty_payload)
            .with_on_failure(self.on_failure)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["dongle-send", "msg.json"]).expect("valid arguments");
        assert_eq!(args.instruction, 1);
        assert_eq!(args.send_config(), SendConfig::default());
        assert_eq!(args.timeout(), Duration::from_secs(2));
        assert_eq!(args.log_level(), "info");
        assert_eq!(args.input, Some(PathBuf::from("msg.json")));
    }

    #[test]
    fn test_framing_options() {
        let args = Args::try_parse_from([
            "dongle-send",
            "-i",
            "0x64",
            "--chunk-size",
            "100",
            "--empty-payload",
            "header-only",
            "--on-failure",
            "abort",
            "-vv",
            "--text",
            "{}",
        ])
        .expect("valid arguments");
        assert_eq!(args.instruction, 100);
        assert_eq!(
            args.send_config(),
            SendConfig::default()
                .with_chunk_size(100)
                .with_empty_payload(EmptyPayload::HeaderOnly)
                .with_on_failure(OnFailure::Abort)
        );
        assert_eq!(args.log_level(), "trace");
        assert_eq!(args.text.as_deref(), Some("{}"));
    }

    #[test]
    fn test_rejected_arguments() {
        assert!(Args::try_parse_from(["dongle-send"]).is_err());
        assert!(Args::try_parse_from(["dongle-send", "--chunk-size", "0", "f"]).is_err());
        assert!(Args::try_parse_from(["dongle-send", "-i", "256", "f"]).is_err());
        assert!(Args::try_parse_from(["dongle-send", "--text", "x", "f"]).is_err());
        assert!(
            Args::try_parse_from(["dongle-send", "--dry-run", "-d", "/dev/ttyUSB0", "f"]).is_err()
        );
    }

    #[test]
    fn test_verbose_help_mentions_frames() {
        let command = Args::command();
        let verbose = command
            .get_arguments()
            .find(|arg| arg.get_id() == "verbose")
            .expect("-v is defined");
        let help = verbose.get_help().expect("-v has help").to_string();
        assert!(help.contains("frame"));
    }
}
