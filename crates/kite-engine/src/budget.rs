//! Round and call budgets per tool mode.

/// How the user set up tools for this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPreference {
    /// An MCP tool/server was explicitly selected.
    Mcp,
    /// The app-builder was explicitly selected.
    AppBuilder,
    /// Nothing explicit; tools may still be available.
    Auto,
}

/// Effective mode for the turn, derived from the preference and what is
/// actually usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    McpExplicit,
    AppBuilder,
    Auto,
    /// No tools usable at all: plain single-round chat.
    Plain,
}

impl ToolMode {
    pub fn derive(preference: ToolPreference, has_servers: bool, app_dev_enabled: bool) -> Self {
        match preference {
            ToolPreference::Mcp if has_servers => ToolMode::McpExplicit,
            ToolPreference::AppBuilder if app_dev_enabled => ToolMode::AppBuilder,
            _ if has_servers || app_dev_enabled => ToolMode::Auto,
            _ => ToolMode::Plain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundBudget {
    pub max_rounds: u32,
    pub max_calls_per_round: usize,
}

impl RoundBudget {
    pub fn for_mode(mode: ToolMode) -> Self {
        match mode {
            ToolMode::McpExplicit => Self {
                max_rounds: 6,
                max_calls_per_round: 4,
            },
            ToolMode::AppBuilder => Self {
                max_rounds: 4,
                max_calls_per_round: 2,
            },
            ToolMode::Auto => Self {
                max_rounds: 4,
                max_calls_per_round: 3,
            },
            ToolMode::Plain => Self {
                max_rounds: 1,
                max_calls_per_round: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budgets_match_modes() {
        assert_eq!(
            RoundBudget::for_mode(ToolMode::McpExplicit),
            RoundBudget {
                max_rounds: 6,
                max_calls_per_round: 4
            }
        );
        assert_eq!(RoundBudget::for_mode(ToolMode::Plain).max_rounds, 1);
    }

    #[test]
    fn mode_derivation_falls_back_sensibly() {
        assert_eq!(
            ToolMode::derive(ToolPreference::Mcp, true, false),
            ToolMode::McpExplicit
        );
        // Explicit MCP selection with no servers degrades to whatever is left.
        assert_eq!(
            ToolMode::derive(ToolPreference::Mcp, false, true),
            ToolMode::Auto
        );
        assert_eq!(
            ToolMode::derive(ToolPreference::AppBuilder, false, true),
            ToolMode::AppBuilder
        );
        assert_eq!(
            ToolMode::derive(ToolPreference::Auto, false, false),
            ToolMode::Plain
        );
    }
}
