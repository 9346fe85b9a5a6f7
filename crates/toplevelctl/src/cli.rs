//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;
use toplevelctl_core::{Action, Config, WindowId};

#[derive(Debug, Parser)]
#[command(
    name = "toplevelctl",
    version,
    about = "List and control wlroots toplevel windows",
    long_about = "List and control wlroots toplevel windows.\n\n\
        Without -m, prints one snapshot and exits. With -m, keeps running, \
        prints a snapshot whenever the compositor reports changes and accepts \
        commands on a control socket (see -x)."
)]
pub struct Cli {
    /// Focus the window with this id
    #[arg(short = 'f', value_name = "ID")]
    pub focus: Option<u64>,

    /// Maximize the window with this id
    #[arg(short = 'a', value_name = "ID")]
    pub maximize: Option<u64>,

    /// Unmaximize the window with this id
    #[arg(short = 'u', value_name = "ID")]
    pub unmaximize: Option<u64>,

    /// Minimize the window with this id
    #[arg(short = 'i', value_name = "ID")]
    pub minimize: Option<u64>,

    /// Restore (unminimize) the window with this id
    #[arg(short = 'r', value_name = "ID")]
    pub restore: Option<u64>,

    /// Close the window with this id
    #[arg(short = 'c', value_name = "ID")]
    pub close: Option<u64>,

    /// Fullscreen the window with this id
    #[arg(short = 's', value_name = "ID")]
    pub fullscreen: Option<u64>,

    /// Leave fullscreen for the window with this id
    #[arg(short = 'S', value_name = "ID")]
    pub unfullscreen: Option<u64>,

    /// Registry name of the output used for fullscreen requests
    #[arg(short = 'o', value_name = "OUTPUT")]
    pub output: Option<u32>,

    /// Keep running: print changes continuously and serve the control socket
    #[arg(short = 'm')]
    pub monitor: bool,

    /// Print snapshots as JSON
    #[arg(short = 'j')]
    pub json: bool,

    /// Print JSON on a single line instead of indented
    #[arg(long)]
    pub compact: bool,

    /// Sort snapshots by window id
    #[arg(short = 'q')]
    pub sort: bool,

    /// Send a command to a running instance and exit, e.g. -x "c 3" or -x q
    #[arg(short = 'x', value_name = "MESSAGE")]
    pub send: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config file (default: $XDG_CONFIG_HOME/toplevelctl/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Requested actions in application order.
    pub fn actions(&self) -> Vec<(Action, WindowId)> {
        [
            (Action::Focus, self.focus),
            (Action::Maximize, self.maximize),
            (Action::Unmaximize, self.unmaximize),
            (Action::Minimize, self.minimize),
            (Action::Restore, self.restore),
            (Action::Fullscreen, self.fullscreen),
            (Action::Unfullscreen, self.unfullscreen),
            (Action::Close, self.close),
        ]
        .into_iter()
        .filter_map(|(action, id)| id.map(|id| (action, WindowId(id))))
        .collect()
    }

    /// Apply flags that override config values.
    pub fn apply(&self, config: &mut Config) {
        if self.json {
            config.json = true;
        }
        if self.compact {
            config.compact = true;
        }
        if self.sort {
            config.sort = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_actions_follow_fixed_order() {
        let cli = Cli::try_parse_from(["toplevelctl", "-c", "1", "-f", "2", "-S", "3", "-a", "4"])
            .expect("parse");
        assert_eq!(
            cli.actions(),
            vec![
                (Action::Focus, WindowId(2)),
                (Action::Maximize, WindowId(4)),
                (Action::Unfullscreen, WindowId(3)),
                (Action::Close, WindowId(1)),
            ]
        );
    }

    #[test]
    fn test_flags_override_config() {
        let args = ["toplevelctl", "-m", "-j", "--compact", "-q", "-vv"];
        let cli = Cli::try_parse_from(args).expect("parse");
        assert!(cli.monitor);
        assert_eq!(cli.verbose, 2);

        let mut config = Config::default();
        cli.apply(&mut config);
        assert!(config.json);
        assert!(config.compact);
        assert!(config.sort);
    }

    #[test]
    fn test_send_mode() {
        let cli = Cli::try_parse_from(["toplevelctl", "-x", "c 3"]).expect("parse");
        assert_eq!(cli.send.as_deref(), Some("c 3"));
        assert!(cli.actions().is_empty());
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let cli = Cli::try_parse_from(["toplevelctl"]).expect("parse");
        let mut config = Config {
            json: true,
            compact: true,
            ..Config::default()
        };
        cli.apply(&mut config);
        assert!(config.json);
        assert!(config.compact);
        assert!(!config.sort);
    }

    #[test]
    fn test_rejects_malformed_arguments() {
        assert!(Cli::try_parse_from(["toplevelctl", "-f", "abc"]).is_err());
        assert!(Cli::try_parse_from(["toplevelctl", "-f"]).is_err());
        assert!(Cli::try_parse_from(["toplevelctl", "-z"]).is_err());
    }
}
