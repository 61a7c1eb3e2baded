use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "dial-overlay",
    version = dial_overlay_core::version(),
    about = "Drive DIAL chat overlays against an in-memory host page and a simulated chat app",
)]
pub struct Args {
    /// Specify custom configuration file path
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Specify custom configuration file path"
    )]
    pub config_path: Option<PathBuf>,

    /// Validate configuration and exit without starting
    #[arg(
        long = "dry-run",
        help = "Validate configuration and exit without starting"
    )]
    pub dry_run: bool,

    /// Use default configuration and ignore config files
    #[arg(
        long = "defaults",
        help = "Use default configuration and ignore config files"
    )]
    pub use_defaults: bool,

    #[arg(short = 'q', long = "quiet", help = "Only log info, warnings and errors")]
    pub quiet: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        conflicts_with = "quiet",
        help = "Log everything, including every message on the wire"
    )]
    pub verbose: bool,

    #[arg(
        long = "viewport",
        value_name = "WxH",
        default_value = "1280x800",
        help = "Size of the simulated host window"
    )]
    pub viewport: ViewportArg,

    #[arg(
        short = 'm',
        long = "message",
        default_value = "Hello from the host page!",
        help = "Message to send to every overlay"
    )]
    pub message: String,

    #[arg(
        long = "ready-delay",
        value_name = "MS",
        default_value_t = 250,
        help = "How long the simulated chat app takes to announce it is ready"
    )]
    pub ready_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportArg {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportArg {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

impl FromStr for ViewportArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Expected WIDTHxHEIGHT, got '{s}'"))?;
        let parse = |value: &str| {
            value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| format!("Invalid viewport dimension '{value}'"))
        };
        Ok(Self {
            width: parse(width)?,
            height: parse(height)?,
        })
    }
}

pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_parsing() {
        assert_eq!(
            "390x844".parse::<ViewportArg>(),
            Ok(ViewportArg {
                width: 390,
                height: 844
            })
        );
        assert!("390".parse::<ViewportArg>().is_err());
        assert!("0x844".parse::<ViewportArg>().is_err());
        assert!("axb".parse::<ViewportArg>().is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["dial-overlay", "--defaults", "-v", "--viewport", "700x390"]);
        assert!(args.use_defaults);
        assert!(args.verbose);
        assert_eq!(args.viewport.height, 390);
        assert_eq!(args.ready_delay_ms, 250);
    }
}
