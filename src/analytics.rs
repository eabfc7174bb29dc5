//! Upstream lead-analytics payload and the dashboard view model it is reshaped into.
//!
//! Rules implemented:
//! - absent or empty input yields the fixed fallback view model
//! - only the first record of the upstream sequence is used
//! - appointments are the per-platform sum, or a 26% estimate when that sum is 0
//! - response time prefers the upstream label unless it is `"N/A"`
//! - daily metrics fall back to a fixed 7-day series when missing or empty

use serde::{Deserialize, Serialize};

const APPOINTMENT_ESTIMATE_RATE: f64 = 0.26;
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawAnalyticsRecord {
    pub total_conversations: u64,
    #[serde(default)]
    pub appointments_booked: Option<u64>,
    pub hot_leads: RawHotLeads,
    pub platform_distribution: RawPlatformDistribution,
    pub lead_distribution: RawLeadDistribution,
    pub average_response_time_minutes: String,
    pub average_response_time_formatted: String,
    #[serde(default)]
    pub response_time_data_points: Option<u64>,
    #[serde(default)]
    pub daily_metrics: Option<Vec<DailyMetric>>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawHotLeads {
    pub total: u64,
    #[serde(default)]
    pub percentage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPlatformDistribution {
    pub messenger: RawPlatformBucket,
    pub instagram: RawPlatformBucket,
    #[serde(default)]
    pub other: Option<RawPlatformBucket>,
}

/// Per-platform counters. `appointments` and `conversion_rate` were added to the
/// upstream payload later, so older payloads decode with zero/empty values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPlatformBucket {
    pub count: u64,
    #[serde(default)]
    pub appointments: u64,
    #[serde(default)]
    pub conversion_rate: String,
    #[serde(default)]
    pub percentage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawLeadDistribution {
    pub grade_a: RawGradeBucket,
    pub grade_b: RawGradeBucket,
    pub grade_c: RawGradeBucket,
    pub grade_d: RawGradeBucket,
}

impl RawLeadDistribution {
    pub fn count(&self, grade: Grade) -> u64 {
        match grade {
            Grade::A => self.grade_a.count,
            Grade::B => self.grade_b.count,
            Grade::C => self.grade_c.count,
            Grade::D => self.grade_d.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawGradeBucket {
    pub count: u64,
    #[serde(default)]
    pub percentage: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
}

/// One point of the conversation timeline. Shared verbatim between the wire
/// format and the view model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetric {
    pub date: String,
    pub day_name: String,
    pub conversations: u64,
    pub appointments: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::A, Grade::B, Grade::C, Grade::D];

    pub fn label(self) -> &'static str {
        match self {
            Grade::A => "A - Hot Leads",
            Grade::B => "B - Warm Leads",
            Grade::C => "C - Cool Leads",
            Grade::D => "D - Cold Leads",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Grade::A => "#ef4444",
            Grade::B => "#f97316",
            Grade::C => "#3b82f6",
            Grade::D => "#64748b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Messenger,
    Instagram,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadBucket {
    pub grade: Grade,
    pub label: &'static str,
    pub count: u64,
    pub color: &'static str,
}

impl LeadBucket {
    pub fn new(grade: Grade, count: u64) -> Self {
        Self {
            grade,
            label: grade.label(),
            count,
            color: grade.color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub conversations: u64,
    pub appointments: u64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformData {
    pub messenger: PlatformStats,
    pub instagram: PlatformStats,
}

impl PlatformData {
    pub fn get(&self, platform: Platform) -> &PlatformStats {
        match platform {
            Platform::Messenger => &self.messenger,
            Platform::Instagram => &self.instagram,
        }
    }

    pub fn total_appointments(&self) -> u64 {
        self.messenger
            .appointments
            .saturating_add(self.instagram.appointments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lead {
    pub id: u32,
    pub name: String,
    pub score: u32,
    pub grade: Grade,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardViewModel {
    pub total_conversations: u64,
    pub appointments_booked: u64,
    pub hot_leads: u64,
    pub avg_response_time: String,
    pub lead_distribution: [LeadBucket; 4],
    pub platform_data: PlatformData,
    pub daily_metrics: Vec<DailyMetric>,
    pub leads: Vec<Lead>,
}

pub fn fallback_view_model() -> DashboardViewModel {
    DashboardViewModel {
        total_conversations: 89,
        appointments_booked: 23,
        hot_leads: 28,
        avg_response_time: "2.3m".to_string(),
        lead_distribution: [
            LeadBucket::new(Grade::A, 28),
            LeadBucket::new(Grade::B, 45),
            LeadBucket::new(Grade::C, 62),
            LeadBucket::new(Grade::D, 35),
        ],
        platform_data: PlatformData {
            messenger: PlatformStats {
                conversations: 156,
                appointments: 42,
                conversion_rate: 27.0,
            },
            instagram: PlatformStats {
                conversations: 124,
                appointments: 31,
                conversion_rate: 25.0,
            },
        },
        daily_metrics: fallback_daily_metrics(),
        leads: placeholder_leads(),
    }
}

pub fn fallback_daily_metrics() -> Vec<DailyMetric> {
    [
        ("2025-11-01", "Mon", 65, 28),
        ("2025-11-02", "Tue", 59, 31),
        ("2025-11-03", "Wed", 80, 42),
        ("2025-11-04", "Thu", 81, 45),
        ("2025-11-05", "Fri", 56, 38),
        ("2025-11-06", "Sat", 49, 35),
        ("2025-11-07", "Sun", 42, 25),
    ]
    .into_iter()
    .map(|(date, day_name, conversations, appointments)| DailyMetric {
        date: date.to_string(),
        day_name: day_name.to_string(),
        conversations,
        appointments,
    })
    .collect()
}

/// Static lead list shown in the lead table. The upstream payload carries no
/// per-lead records, so this is never derived from live data.
pub fn placeholder_leads() -> Vec<Lead> {
    [
        (1, "Sarah Johnson", 92, Grade::A, Platform::Instagram),
        (2, "Michael Chen", 88, Grade::A, Platform::Messenger),
        (3, "Emily Rodriguez", 74, Grade::B, Platform::Instagram),
        (4, "David Kim", 61, Grade::C, Platform::Messenger),
        (5, "Jessica Martinez", 38, Grade::D, Platform::Instagram),
    ]
    .into_iter()
    .map(|(id, name, score, grade, platform)| Lead {
        id,
        name: name.to_string(),
        score,
        grade,
        platform,
    })
    .collect()
}

pub fn transform(raw: Option<&[RawAnalyticsRecord]>) -> DashboardViewModel {
    let Some(record) = raw.and_then(|records| records.first()) else {
        return fallback_view_model();
    };

    let platform_data = PlatformData {
        messenger: platform_stats(&record.platform_distribution.messenger),
        instagram: platform_stats(&record.platform_distribution.instagram),
    };

    let appointments_booked = match platform_data.total_appointments() {
        0 => estimate_appointments(record.total_conversations),
        sum => sum,
    };

    let lead_distribution =
        Grade::ALL.map(|grade| LeadBucket::new(grade, record.lead_distribution.count(grade)));

    let daily_metrics = record
        .daily_metrics
        .as_ref()
        .filter(|points| !points.is_empty())
        .cloned()
        .unwrap_or_else(fallback_daily_metrics);

    DashboardViewModel {
        total_conversations: record.total_conversations,
        appointments_booked,
        hot_leads: record.hot_leads.total,
        avg_response_time: format_response_time(
            &record.average_response_time_formatted,
            &record.average_response_time_minutes,
        ),
        lead_distribution,
        platform_data,
        daily_metrics,
        leads: placeholder_leads(),
    }
}

/// Parses `"27%"` style rates. Anything non-numeric becomes `0.0`.
pub fn parse_conversion_rate(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

pub fn format_response_time(formatted: &str, minutes: &str) -> String {
    if formatted != NOT_AVAILABLE {
        return formatted.to_string();
    }

    let value = minutes
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0);
    format!("{value:.1}m")
}

pub fn estimate_appointments(total_conversations: u64) -> u64 {
    (total_conversations as f64 * APPOINTMENT_ESTIMATE_RATE).round() as u64
}

fn platform_stats(bucket: &RawPlatformBucket) -> PlatformStats {
    PlatformStats {
        conversations: bucket.count,
        appointments: bucket.appointments,
        conversion_rate: parse_conversion_rate(&bucket.conversion_rate),
    }
}
