pub mod app_config;
pub mod plan_config;

pub use app_config::AppConfig;
pub use plan_config::PlanConfig;

#[cfg(feature = "cli")]
pub use cli_args::CliConfig;

#[cfg(feature = "cli")]
mod cli_args {
    use crate::config::app_config::AppConfig;
    use crate::domain::model::AnalysisRequest;
    use crate::utils::error::Result;
    use crate::utils::validation::{self, Validate};
    use clap::Parser;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, Parser)]
    #[command(name = "liquidity-etl")]
    #[command(about = "Answer questions about liquidity pools with a subgraph-backed report")]
    pub struct CliConfig {
        /// Question about liquidity, e.g. "top 20 swaps in the last week"
        pub query: Option<String>,

        /// Pool address to analyze
        #[arg(long)]
        pub pool: Option<String>,

        /// Start of the analysis window (unix seconds)
        #[arg(long)]
        pub start_time: Option<i64>,

        /// End of the analysis window (unix seconds)
        #[arg(long)]
        pub end_time: Option<i64>,

        /// GraphQL schema (SDL) used to check the planned query
        #[arg(long)]
        pub schema: Option<String>,

        /// Output directory, overrides LIQUIDITY_ETL_OUTPUT
        #[arg(long)]
        pub output_path: Option<String>,

        /// Suggested report file name
        #[arg(long)]
        pub report_name: Option<String>,

        /// Also write a zip bundle of every artifact
        #[arg(long)]
        pub bundle: bool,

        /// Abort the run when an analysis script fails
        #[arg(long)]
        pub strict: bool,

        #[arg(long, help = "Log CPU and memory usage per stage")]
        pub monitor: bool,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON")]
        pub json_logs: bool,

        /// Read questions from stdin until `exit`
        #[arg(long)]
        pub interactive: bool,
    }

    impl CliConfig {
        /// 命令列參數覆蓋環境設定
        pub fn apply_to(&self, config: &mut AppConfig) {
            if let Some(output) = &self.output_path {
                config.output_path = output.clone();
            }
            if self.bundle {
                config.bundle_artifacts = true;
            }
            if self.strict {
                config.strict_scripts = true;
            }
        }

        pub fn to_request(&self, question: &str) -> AnalysisRequest {
            AnalysisRequest {
                question: question.to_string(),
                pool_address: self.pool.clone(),
                start_time: self.start_time,
                end_time: self.end_time,
                report_name: self.report_name.clone(),
            }
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            if !self.interactive {
                let query = validation::validate_required_field("query", &self.query)?;
                validation::validate_non_empty_string("query", query)?;
            }

            validation::validate_time_window(self.start_time, self.end_time)?;

            if let Some(schema) = &self.schema {
                validation::validate_extension("schema", schema, &["graphql", "gql"])?;
            }

            if let Some(pool) = &self.pool {
                validation::validate_address("pool", pool)?;
            }

            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_cli_arguments() {
            let cli = CliConfig::parse_from([
                "liquidity-etl",
                "top swaps this week",
                "--pool",
                "0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640",
                "--start-time",
                "1700000000",
                "--bundle",
            ]);

            assert_eq!(cli.query.as_deref(), Some("top swaps this week"));
            assert!(cli.validate().is_ok());

            let mut config = AppConfig::new("https://example.com");
            cli.apply_to(&mut config);
            assert!(config.bundle_artifacts);

            let request = cli.to_request("top swaps this week");
            assert_eq!(request.start_time, Some(1_700_000_000));
        }

        #[test]
        fn test_query_required_unless_interactive() {
            let cli = CliConfig::parse_from(["liquidity-etl"]);
            assert!(cli.validate().is_err());

            let cli = CliConfig::parse_from(["liquidity-etl", "--interactive"]);
            assert!(cli.validate().is_ok());
        }

        #[test]
        fn test_invalid_pool_address() {
            let cli = CliConfig::parse_from(["liquidity-etl", "pools", "--pool", "0x123"]);
            assert!(cli.validate().is_err());
        }
    }
}
