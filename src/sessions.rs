use chrono::{Days, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneTemplate {
    Standard,
    Short,
}

pub struct MilestoneStep {
    pub kind: &'static str,
    pub title: &'static str,
    pub offset_days: u64,
}

const STANDARD_STEPS: &[MilestoneStep] = &[
    MilestoneStep { kind: "registration_open", title: "Registration opens", offset_days: 0 },
    MilestoneStep { kind: "registration_close", title: "Registration closes", offset_days: 14 },
    MilestoneStep { kind: "topic_approval", title: "Topic approval", offset_days: 21 },
    MilestoneStep { kind: "proposal_due", title: "Proposal due", offset_days: 35 },
    MilestoneStep { kind: "progress_report", title: "Progress report", offset_days: 70 },
    MilestoneStep { kind: "final_submission", title: "Final submission", offset_days: 112 },
    MilestoneStep { kind: "defense", title: "Defense", offset_days: 126 },
];

const SHORT_STEPS: &[MilestoneStep] = &[
    MilestoneStep { kind: "registration_open", title: "Registration opens", offset_days: 0 },
    MilestoneStep { kind: "registration_close", title: "Registration closes", offset_days: 7 },
    MilestoneStep { kind: "topic_approval", title: "Topic approval", offset_days: 10 },
    MilestoneStep { kind: "proposal_due", title: "Proposal due", offset_days: 17 },
    MilestoneStep { kind: "progress_report", title: "Progress report", offset_days: 35 },
    MilestoneStep { kind: "final_submission", title: "Final submission", offset_days: 56 },
    MilestoneStep { kind: "defense", title: "Defense", offset_days: 63 },
];

impl MilestoneTemplate {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "short" => Some(Self::Short),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Short => "short",
        }
    }

    pub fn steps(self) -> &'static [MilestoneStep] {
        match self {
            Self::Standard => STANDARD_STEPS,
            Self::Short => SHORT_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub kind: &'static str,
    pub title: &'static str,
    pub due_date: NaiveDate,
    pub sort_order: i64,
}

pub fn generate_milestones(start: NaiveDate, template: MilestoneTemplate) -> Vec<Milestone> {
    template
        .steps()
        .iter()
        .enumerate()
        .filter_map(|(i, step)| {
            Some(Milestone {
                kind: step.kind,
                title: step.title,
                due_date: start.checked_add_days(Days::new(step.offset_days))?,
                sort_order: i as i64,
            })
        })
        .collect()
}

pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}
