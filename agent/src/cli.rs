use std::path::PathBuf;

use clap::{Parser, Subcommand};
use iota_common::AgentConfig;

#[derive(Parser, Debug)]
#[command(name = "iota-agent", version, about = "Keeps a device shadow in sync with local outlets and sensors")]
pub struct Cli {
    #[arg(long, global = true, env = "IOTA_CONFIG", help = "Path to agent.json")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, env = "IOTA_THING", help = "Thing (shadow) name")]
    pub thing: Option<String>,
    #[arg(long, global = true, env = "MQTT_HOST")]
    pub mqtt_host: Option<String>,
    #[arg(long, global = true, env = "MQTT_PORT")]
    pub mqtt_port: Option<u16>,
    #[arg(long, global = true, env = "MQTT_USER")]
    pub mqtt_user: Option<String>,
    #[arg(long, global = true, env = "MQTT_PASS", hide_env_values = true)]
    pub mqtt_pass: Option<String>,
    #[arg(long, global = true, env = "IOTA_LOG", help = "Log filter directive, overrides RUST_LOG")]
    pub log: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror the shadow continuously until interrupted.
    Run {
        #[arg(long, env = "IOTA_BOARD", default_value = "./.iota/board", help = "Board directory")]
        board: PathBuf,
        #[arg(long, help = "Use an in-memory board instead of --board")]
        simulate: bool,
        #[arg(long, env = "IOTA_HTTP_PORT", default_value_t = 8080)]
        http_port: u16,
    },
    /// Request a desired outlet state once and exit.
    Set { property: String, value: String },
    /// Print the current shadow document and exit.
    Get,
    /// Write the effective configuration to the config path.
    Init {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut AgentConfig) {
        if let Some(thing) = &self.thing {
            config.thing_name = thing.clone();
        }
        if let Some(host) = &self.mqtt_host {
            config.network.mqtt_host = host.clone();
        }
        if let Some(port) = self.mqtt_port {
            config.network.mqtt_port = port;
        }
        if let Some(user) = &self.mqtt_user {
            config.network.mqtt_user = user.clone();
        }
        if let Some(pass) = &self.mqtt_pass {
            config.network.mqtt_pass = pass.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_command_parses() {
        let cli = Cli::try_parse_from(["iota-agent", "--thing", "porch", "set", "outlet1", "on"]).unwrap();

        assert!(matches!(
            &cli.command,
            Commands::Set { property, value } if property == "outlet1" && value == "on"
        ));
        let mut config = AgentConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.thing_name, "porch");
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from(["iota-agent", "run", "--simulate", "--http-port", "9000"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::Run {
                simulate: true,
                http_port: 9000,
                ..
            }
        ));
    }

    #[test]
    fn overrides_leave_unset_fields_alone() {
        let cli = Cli::try_parse_from(["iota-agent", "--mqtt-port", "1883", "get"]).unwrap();
        let mut config = AgentConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.network.mqtt_port, 1883);
        assert_eq!(config.poll_interval_ms, AgentConfig::default().poll_interval_ms);
    }
}
