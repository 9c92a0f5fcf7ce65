//! Argumentos de línea de comandos.
//!
//! `upgrade-pilot [--auto] [--max-risk <level>] [--skip-failed]
//!                [--script "<entries>"] [--max-iterations <n>]`

use pilot_core::Risk;

use crate::config::PilotConfig;
use crate::errors::AppError;

pub const USAGE: &str = "usage: upgrade-pilot [--auto] [--max-risk <none|low|medium|high|unspecified>] [--skip-failed] \
                         [--script \"apply, skip, pin, ...\"] [--max-iterations <n>]";

/// Quién decide cada comando.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    Auto,
    Script(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub mode: Mode,
    pub pilot: PilotConfig,
    pub help: bool,
}

impl CliOptions {
    /// Interpreta los argumentos (sin el nombre del programa) sobre la
    /// configuración base; los flags tienen prioridad sobre el entorno.
    pub fn parse<I>(args: I, base: PilotConfig) -> Result<Self, AppError>
        where I: IntoIterator<Item = String>
    {
        let mut opts = Self { mode: Mode::Interactive,
                              pilot: base,
                              help: false };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--auto" => opts.mode = Mode::Auto,
                "--skip-failed" => opts.pilot.skip_failed = true,
                "--max-risk" => {
                    let raw = value_for(&mut args, "--max-risk")?;
                    opts.pilot.max_risk = raw.parse::<Risk>().map_err(AppError::Usage)?;
                }
                "--max-iterations" => {
                    let raw = value_for(&mut args, "--max-iterations")?;
                    opts.pilot.max_iterations = raw.parse::<usize>()
                                                   .ok()
                                                   .filter(|n| *n > 0)
                                                   .ok_or_else(|| AppError::Usage(format!("invalid --max-iterations '{raw}'")))?;
                }
                "--script" => opts.mode = Mode::Script(value_for(&mut args, "--script")?),
                "-h" | "--help" => opts.help = true,
                other => return Err(AppError::Usage(format!("unknown argument '{other}'"))),
            }
        }
        Ok(opts)
    }
}

fn value_for(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, AppError> {
    args.next().ok_or_else(|| AppError::Usage(format!("{flag} expects a value")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn parse(args: &[&str]) -> Result<CliOptions, AppError> {
        CliOptions::parse(args.iter().map(|s| s.to_string()), AppConfig::default().pilot)
    }

    #[test]
    fn interactive_by_default() {
        let opts = parse(&[]).expect("parse");
        assert_eq!(opts.mode, Mode::Interactive);
        assert_eq!(opts.pilot, AppConfig::default().pilot);
    }

    #[test]
    fn flags_override_configuration() {
        let opts = parse(&["--auto", "--max-risk", "high", "--skip-failed", "--max-iterations", "20"]).expect("parse");
        assert_eq!(opts.mode, Mode::Auto);
        assert_eq!(opts.pilot.max_risk, Risk::High);
        assert!(opts.pilot.skip_failed);
        assert_eq!(opts.pilot.max_iterations, 20);
    }

    #[test]
    fn script_mode_keeps_the_transcript() {
        let opts = parse(&["--script", "apply, skip"]).expect("parse");
        assert_eq!(opts.mode, Mode::Script("apply, skip".into()));
    }

    #[test]
    fn bad_arguments_are_usage_errors() {
        assert!(matches!(parse(&["--max-risk"]), Err(AppError::Usage(_))));
        assert!(matches!(parse(&["--max-risk", "extreme"]), Err(AppError::Usage(_))));
        assert!(matches!(parse(&["--frobnicate"]), Err(AppError::Usage(_))));
    }
}
