//! Loosely shaped remote records and the alias tables used to read them.
//!
//! The sheet behind the remote script has been edited by hand over the years,
//! so the same logical column may arrive under an English or a Thai header.
//! Each logical field has a prioritized alias list; the first alias holding a
//! non-blank value wins.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row as returned by the remote endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    /// First non-blank value among `aliases`, trimmed. Numbers and booleans
    /// are rendered as text.
    pub fn text(&self, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .filter_map(|alias| self.0.get(*alias))
            .find_map(value_text)
    }

    /// Like [`RawRecord::text`] but yields an empty string when absent.
    pub fn text_or_empty(&self, aliases: &[&str]) -> String {
        self.text(aliases).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ============================================================================
// Alias tables
// ============================================================================

pub mod competition_fields {
    pub const ID: &[&str] = &["id", "competitionId", "รหัส", "รหัสการแข่งขัน"];
    pub const NAME: &[&str] = &["name", "title", "ชื่อ", "ชื่อการแข่งขัน"];
    pub const LEVEL: &[&str] = &["level", "ระดับ", "ระดับชั้น"];
    pub const STATUS: &[&str] = &["status", "สถานะ"];
    pub const PARTICIPANTS: &[&str] = &["participants", "participantCount", "จำนวนผู้เข้าแข่งขัน"];
    pub const ICON: &[&str] = &["icon", "ไอคอน"];
    pub const DATE: &[&str] = &["date", "วันที่", "วันที่แข่งขัน"];
}

pub mod result_fields {
    pub const RANK: &[&str] = &["rank", "ลำดับ", "อันดับ"];
    pub const LEVEL: &[&str] = &["level", "ระดับชั้น", "ระดับ"];
    pub const DIVISION: &[&str] = &["type", "division", "ประเภท", "ประเภทการแข่งขัน"];
    pub const AWARD: &[&str] = &["award", "รางวัล", "ผลการแข่งขัน"];
    pub const SCHOOL: &[&str] = &["school", "โรงเรียน", "ชื่อโรงเรียน"];
    pub const CERTIFICATE: &[&str] = &[
        "certificate",
        "certificateUrl",
        "certificate_url",
        "เกียรติบัตร",
        "ลิงก์เกียรติบัตร",
    ];
    pub const PARTICIPANTS: &[&str] = &["participants", "students", "ผู้เข้าแข่งขัน", "นักเรียน"];
    pub const COACH: &[&str] = &["coach", "teacher", "ครูผู้ฝึกสอน", "ครูที่ปรึกษา"];
    pub const PROJECT: &[&str] = &["project", "projectTitle", "ชื่อโครงงาน", "ชื่อผลงาน"];
    pub const NOTES: &[&str] = &["notes", "note", "หมายเหตุ"];
}
