use std::fmt;

use serde::{Deserialize, Serialize};

/// Ranked outcome classification of a result row.
///
/// Declaration order is display rank order, so the derived `Ord` sorts
/// champions first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AwardTier {
    Champion,
    FirstRunnerUp,
    SecondRunnerUp,
    ThirdRunnerUp,
    HonorableMention,
    Participant,
}

impl AwardTier {
    pub const ALL: [AwardTier; 6] = [
        AwardTier::Champion,
        AwardTier::FirstRunnerUp,
        AwardTier::SecondRunnerUp,
        AwardTier::ThirdRunnerUp,
        AwardTier::HonorableMention,
        AwardTier::Participant,
    ];

    /// Sort key for rows without a recognized award; after every tier.
    pub const UNRANKED: u8 = u8::MAX;

    /// Display rank, 1 for champion.
    pub fn rank(&self) -> u8 {
        match self {
            AwardTier::Champion => 1,
            AwardTier::FirstRunnerUp => 2,
            AwardTier::SecondRunnerUp => 3,
            AwardTier::ThirdRunnerUp => 4,
            AwardTier::HonorableMention => 5,
            AwardTier::Participant => 6,
        }
    }

    pub fn sort_key(tier: Option<AwardTier>) -> u8 {
        tier.map(|t| t.rank()).unwrap_or(Self::UNRANKED)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AwardTier::Champion => "ชนะเลิศ",
            AwardTier::FirstRunnerUp => "รองชนะเลิศอันดับ 1",
            AwardTier::SecondRunnerUp => "รองชนะเลิศอันดับ 2",
            AwardTier::ThirdRunnerUp => "รองชนะเลิศอันดับ 3",
            AwardTier::HonorableMention => "ชมเชย",
            AwardTier::Participant => "เข้าร่วม",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            AwardTier::Champion => "#FFD700",
            AwardTier::FirstRunnerUp => "#C0C0C0",
            AwardTier::SecondRunnerUp => "#CD7F32",
            AwardTier::ThirdRunnerUp => "#4A90D9",
            AwardTier::HonorableMention => "#6BBF59",
            AwardTier::Participant => "#9E9E9E",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            AwardTier::Champion => "🥇",
            AwardTier::FirstRunnerUp => "🥈",
            AwardTier::SecondRunnerUp => "🥉",
            AwardTier::ThirdRunnerUp => "🏅",
            AwardTier::HonorableMention => "🎖️",
            AwardTier::Participant => "📜",
        }
    }

    /// Top four tiers count as placing.
    pub fn is_placing(&self) -> bool {
        self.rank() <= AwardTier::ThirdRunnerUp.rank()
    }

    /// Resolve a free-text award label, Thai or English.
    ///
    /// Whitespace, dashes, underscores and dots are ignored, as is a leading
    /// "รางวัล" ("award") prefix.
    pub fn parse(text: &str) -> Option<Self> {
        let folded: String = text
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '.'))
            .collect();
        let key = folded.strip_prefix("รางวัล").unwrap_or(&folded);

        let tier = match key {
            "ชนะเลิศ" | "champion" | "winner" => AwardTier::Champion,
            "รองชนะเลิศ" | "รองชนะเลิศอันดับ1" | "รองชนะเลิศอันดับที่1" | "firstrunnerup"
            | "1strunnerup" | "runnerup" => AwardTier::FirstRunnerUp,
            "รองชนะเลิศอันดับ2" | "รองชนะเลิศอันดับที่2" | "secondrunnerup" | "2ndrunnerup" => {
                AwardTier::SecondRunnerUp
            }
            "รองชนะเลิศอันดับ3" | "รองชนะเลิศอันดับที่3" | "thirdrunnerup" | "3rdrunnerup" => {
                AwardTier::ThirdRunnerUp
            }
            "ชมเชย" | "honorablemention" | "honourablemention" => AwardTier::HonorableMention,
            "เข้าร่วม" | "ผู้เข้าร่วม" | "เข้าร่วมการแข่งขัน" | "participant" | "participation" => {
                AwardTier::Participant
            }
            _ => return None,
        };
        Some(tier)
    }
}

impl fmt::Display for AwardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
