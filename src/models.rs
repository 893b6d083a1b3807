use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OperatorId = i64;
pub type TrackingId = i64;

/// Production stage of a part. Wire names are the server's enum constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartState {
    #[serde(rename = "DESARROLLO")]
    Development,
    #[serde(rename = "EN_PRODUCCION")]
    InProduction,
    #[serde(rename = "CONTROL_CALIDAD_EN_FABRICA")]
    FactoryQualityControl,
    #[serde(rename = "SOLDADO_FLAPEADO")]
    WeldingFlapping,
    #[serde(rename = "FOFATIZADO_LIJADO")]
    PhosphatingSanding,
    #[serde(rename = "PINTADO")]
    Painting,
    #[serde(rename = "EMBALADO")]
    Packing,
    #[serde(rename = "INSTALACION_DOMICILIO")]
    HomeInstallation,
    #[serde(rename = "INSTALADO_EXITOSO")]
    InstalledSuccess,
    #[serde(rename = "FALTANTE")]
    Missing,
    #[serde(rename = "DEVOLUCION_FUERA_DE_MEDIDA")]
    OutOfSpecReturn,
    #[serde(rename = "REPINTANDO_POR_GOLPE_O_RAYON")]
    Repainting,
    #[serde(rename = "REPARACION")]
    Repair,
}

impl PartState {
    pub const ALL: [PartState; 13] = [
        Self::Development,
        Self::InProduction,
        Self::FactoryQualityControl,
        Self::WeldingFlapping,
        Self::PhosphatingSanding,
        Self::Painting,
        Self::Packing,
        Self::HomeInstallation,
        Self::InstalledSuccess,
        Self::Missing,
        Self::OutOfSpecReturn,
        Self::Repainting,
        Self::Repair,
    ];

    /// States shown as board columns, in pipeline order.
    pub const BOARD_STATES: [PartState; 11] = [
        Self::FactoryQualityControl,
        Self::WeldingFlapping,
        Self::PhosphatingSanding,
        Self::Painting,
        Self::Packing,
        Self::HomeInstallation,
        Self::InstalledSuccess,
        Self::Missing,
        Self::OutOfSpecReturn,
        Self::Repainting,
        Self::Repair,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "DESARROLLO",
            Self::InProduction => "EN_PRODUCCION",
            Self::FactoryQualityControl => "CONTROL_CALIDAD_EN_FABRICA",
            Self::WeldingFlapping => "SOLDADO_FLAPEADO",
            Self::PhosphatingSanding => "FOFATIZADO_LIJADO",
            Self::Painting => "PINTADO",
            Self::Packing => "EMBALADO",
            Self::HomeInstallation => "INSTALACION_DOMICILIO",
            Self::InstalledSuccess => "INSTALADO_EXITOSO",
            Self::Missing => "FALTANTE",
            Self::OutOfSpecReturn => "DEVOLUCION_FUERA_DE_MEDIDA",
            Self::Repainting => "REPINTANDO_POR_GOLPE_O_RAYON",
            Self::Repair => "REPARACION",
        }
    }

    /// Column heading, the wire name with spaces.
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Exception states sit outside the normal pipeline.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Self::Missing | Self::OutOfSpecReturn | Self::Repainting | Self::Repair
        )
    }

    /// Position used to order groups; exceptions sort after the pipeline.
    pub fn pipeline_rank(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or(Self::ALL.len())
    }
}

impl std::fmt::Display for PartState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == wanted)
            .ok_or_else(|| format!("Invalid part state: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Operator,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches("ROLE_").to_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "OPERATOR" => Ok(Self::Operator),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPartRef {
    pub id: Option<i64>,
    #[serde(alias = "customPart")]
    pub custom_part_name: Option<String>,
    pub image_file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartMaterialRef {
    pub id: Option<i64>,
    #[serde(alias = "partMaterial", alias = "name")]
    pub material_name: Option<String>,
}

/// A physical part as returned by `GET /part/{id}`.
///
/// Fields this client does not model are kept in `extra` so that the
/// reception update can send the record back without dropping them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: Uuid,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub custom_part: Option<CustomPartRef>,
    #[serde(default)]
    pub part_material: Option<PartMaterialRef>,
    #[serde(default)]
    pub totalweight_kg: Option<f64>,
    #[serde(default)]
    pub sheet_thickness_mm: Option<f64>,
    #[serde(default)]
    pub length_pieces_mm: Option<f64>,
    #[serde(default)]
    pub height_mm: Option<f64>,
    #[serde(default)]
    pub width_mm: Option<f64>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub reception_state: Option<bool>,
    #[serde(default)]
    pub scan_date_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub quality_control_state: Option<bool>,
    #[serde(default)]
    pub part_state: Option<PartState>,
    #[serde(default)]
    pub qr_code_file_path: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Part {
    pub fn is_received(&self) -> bool {
        self.reception_state.unwrap_or(false)
    }

    pub fn display_name(&self) -> &str {
        self.custom_part
            .as_ref()
            .and_then(|c| c.custom_part_name.as_deref())
            .unwrap_or("Unnamed part")
    }

    pub fn image_path(&self) -> Option<&str> {
        self.custom_part
            .as_ref()
            .and_then(|c| c.image_file_path.as_deref())
            .filter(|p| !p.trim().is_empty())
    }
}

/// Board projection of a part, one entry of a [`StateGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSummary {
    pub part_id: Uuid,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub part_name: Option<String>,
    #[serde(default)]
    pub part_state: Option<PartState>,
    #[serde(default)]
    pub scan_date_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub tracking_id: Option<TrackingId>,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, alias = "isTaken")]
    pub taken: bool,
}

impl PartSummary {
    pub fn name(&self) -> &str {
        self.part_name.as_deref().unwrap_or("Unnamed part")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateGroup {
    pub state: PartState,
    #[serde(default)]
    pub parts: Vec<PartSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Active,
    Completed,
}

/// One operator's unit of work on a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub tracking_id: TrackingId,
    pub part_id: Uuid,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub part_name: Option<String>,
    #[serde(default)]
    pub part_state: Option<PartState>,
    #[serde(default)]
    pub operator_id: Option<OperatorId>,
    #[serde(default)]
    pub scan_date_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,
    /// Minutes, computed by the server on completion.
    #[serde(default)]
    pub task_duration: Option<i64>,
    #[serde(default, alias = "isCompleted")]
    pub completed: bool,
    #[serde(default, alias = "isTaken")]
    pub taken: bool,
}

impl TrackingRecord {
    pub fn status(&self) -> TaskStatus {
        if self.completed {
            TaskStatus::Completed
        } else {
            TaskStatus::Active
        }
    }

    pub fn name(&self) -> &str {
        self.part_name.as_deref().unwrap_or("Unnamed part")
    }

    /// Task duration; the server figure wins over the timestamp difference.
    pub fn duration(&self) -> Option<chrono::Duration> {
        if let Some(minutes) = self.task_duration {
            return Some(chrono::Duration::minutes(minutes));
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// Operator task list partitioned by completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTasks {
    pub current: Vec<TrackingRecord>,
    /// Most recent first, capped for display.
    pub completed: Vec<TrackingRecord>,
    /// Number of completed records before the cap was applied.
    pub completed_total: usize,
}

impl UserTasks {
    pub fn partition(records: Vec<TrackingRecord>, completed_limit: usize) -> Self {
        let (mut completed, current): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.completed);
        completed.sort_by(|a, b| {
            b.end_time
                .cmp(&a.end_time)
                .then_with(|| b.tracking_id.cmp(&a.tracking_id))
        });
        let completed_total = completed.len();
        completed.truncate(completed_limit);
        Self {
            current,
            completed,
            completed_total,
        }
    }
}

/// Aggregate performance figures for one operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorMetrics {
    #[serde(default)]
    pub total_tasks: u64,
    /// Minutes.
    #[serde(default)]
    pub average_task_duration: f64,
    #[serde(default)]
    pub avg_duration_by_category: BTreeMap<PartState, f64>,
    #[serde(default)]
    pub part_count_by_period: BTreeMap<String, u64>,
}

impl OperatorMetrics {
    pub fn count_for(&self, period: &str) -> u64 {
        self.part_count_by_period.get(period).copied().unwrap_or(0)
    }
}

/// Render a minute count as `"Nd Nh Nm"`.
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let days = minutes / (24 * 60);
    let hours = (minutes % (24 * 60)) / 60;
    let mins = minutes % 60;
    format!("{}d {}h {}m", days, hours, mins)
}

/// Entry of the server-side reception log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_number: Option<String>,
    pub part_id: String,
    #[serde(default)]
    pub part_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub scan_date_time: Option<NaiveDateTime>,
}

/// Identity returned by `GET /auth/current-user`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentUser {
    #[serde(rename = "userID", alias = "userId", alias = "id")]
    pub user_id: OperatorId,
    #[serde(default)]
    pub role: Option<Role>,
}
