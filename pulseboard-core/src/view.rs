use serde::{Deserialize, Serialize};

use crate::metrics::{ComparisonRow, DashboardSnapshot, FleetKpis};
use crate::models::AgentPerformance;

/// Closed set of dashboard views. Each variant has exactly one render
/// data selector arm, so adding a view is a compile-time checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Overview,
    Detailed,
    Comparison,
}

impl ViewMode {
    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Overview => "Overview",
            ViewMode::Detailed => "Detailed",
            ViewMode::Comparison => "Comparison",
        }
    }
}

/// Render payload for the current view mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewData {
    Overview {
        kpis: FleetKpis,
        top_performers: Vec<AgentPerformance>,
    },
    /// None when no agent is selectable (empty snapshot).
    Detailed(Option<AgentPerformance>),
    Comparison(Vec<ComparisonRow>),
}

/// Presentation-side state: the applied snapshot plus selection and
/// view mode. The snapshot is replaced wholesale by `apply_snapshot`;
/// selection survives refreshes when possible and falls back to the
/// first agent otherwise.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    snapshot: DashboardSnapshot,
    selected_agent_id: Option<String>,
    view_mode: ViewMode,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        &self.snapshot
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn selected_agent_id(&self) -> Option<&str> {
        self.selected_agent_id.as_deref()
    }

    /// Select an agent by id; ignored when the id is not in the current
    /// snapshot.
    pub fn select_agent(&mut self, agent_id: &str) {
        if self.snapshot.agents.iter().any(|a| a.agent_id == agent_id) {
            self.selected_agent_id = Some(agent_id.to_string());
        }
    }

    pub fn selected_agent(&self) -> Option<&AgentPerformance> {
        let id = self.selected_agent_id.as_deref()?;
        self.snapshot.agents.iter().find(|a| a.agent_id == id)
    }

    /// Replace the snapshot and re-validate the selection: a selection
    /// that disappeared falls back to the first available agent.
    pub fn apply_snapshot(&mut self, snapshot: DashboardSnapshot) {
        self.snapshot = snapshot;

        let still_present = self
            .selected_agent_id
            .as_deref()
            .map(|id| self.snapshot.agents.iter().any(|a| a.agent_id == id))
            .unwrap_or(false);

        if !still_present {
            self.selected_agent_id = self
                .snapshot
                .agents
                .first()
                .map(|a| a.agent_id.clone());
        }
    }

    /// Render data for the active view mode.
    pub fn view_data(&self) -> ViewData {
        match self.view_mode {
            ViewMode::Overview => ViewData::Overview {
                kpis: self.snapshot.overview.kpis.clone(),
                top_performers: self.snapshot.overview.top_performers.clone(),
            },
            ViewMode::Detailed => ViewData::Detailed(self.selected_agent().cloned()),
            ViewMode::Comparison => {
                ViewData::Comparison(self.snapshot.overview.comparison_rows.clone())
            }
        }
    }
}
