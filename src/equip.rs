use crate::catalog::ItemTemplate;
use crate::models::player::PlayerProfile;
use crate::models::types::SkillId;

/// One failing requirement class. Evaluation never stops at the first
/// failure; callers get the full list for logging even though any single
/// entry denies the equip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementFailure {
    LevelTooLow { required: u32, actual: u32 },
    LevelTooHigh { limit: u32, actual: u32 },
    BodyTooLow { required: u32, actual: u32 },
    MindTooLow { required: u32, actual: u32 },
    SpiritTooLow { required: u32, actual: u32 },
    WrongRace { required: u32, actual: u32 },
    SkillTooLow { skill: SkillId, required: u32, actual: u32 },
    SkillNotLearned { skill: SkillId },
}

impl core::fmt::Display for RequirementFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RequirementFailure::LevelTooLow { required, actual } => {
                write!(f, "level too low ({actual} < {required})")
            }
            RequirementFailure::LevelTooHigh { limit, actual } => {
                write!(f, "level too high ({actual} > {limit})")
            }
            RequirementFailure::BodyTooLow { required, actual } => {
                write!(f, "body attribute too low ({actual} < {required})")
            }
            RequirementFailure::MindTooLow { required, actual } => {
                write!(f, "mind attribute too low ({actual} < {required})")
            }
            RequirementFailure::SpiritTooLow { required, actual } => {
                write!(f, "spirit attribute too low ({actual} < {required})")
            }
            RequirementFailure::WrongRace { required, actual } => {
                write!(f, "item is restricted to race {required} (player is {actual})")
            }
            RequirementFailure::SkillTooLow { skill, required, actual } => {
                write!(f, "skill {skill} level too low ({actual} < {required})")
            }
            RequirementFailure::SkillNotLearned { skill } => {
                write!(f, "skill {skill} not learned")
            }
        }
    }
}

/// Evaluate every equip gate on `template` against `profile`. Empty result
/// means the equip is allowed. Pure; does not touch container state.
pub fn validate_equip(profile: &PlayerProfile, template: &ItemTemplate) -> Vec<RequirementFailure> {
    let req = &template.requirements;
    let mut failures = Vec::new();

    if let Some(required) = req.min_level {
        if profile.level < required {
            failures.push(RequirementFailure::LevelTooLow { required, actual: profile.level });
        }
    }

    if let Some(limit) = req.max_level {
        if profile.level > limit {
            failures.push(RequirementFailure::LevelTooHigh { limit, actual: profile.level });
        }
    }

    if let Some(required) = req.body {
        if profile.attributes.body < required {
            failures.push(RequirementFailure::BodyTooLow { required, actual: profile.attributes.body });
        }
    }

    if let Some(required) = req.mind {
        if profile.attributes.mind < required {
            failures.push(RequirementFailure::MindTooLow { required, actual: profile.attributes.mind });
        }
    }

    if let Some(required) = req.spirit {
        if profile.attributes.spirit < required {
            failures.push(RequirementFailure::SpiritTooLow { required, actual: profile.attributes.spirit });
        }
    }

    if let Some(required) = req.race {
        if profile.race != required {
            failures.push(RequirementFailure::WrongRace { required, actual: profile.race });
        }
    }

    if let Some(gate) = req.skill {
        match profile.skill_level(gate.skill) {
            None => failures.push(RequirementFailure::SkillNotLearned { skill: gate.skill }),
            Some(actual) if actual < gate.level => {
                failures.push(RequirementFailure::SkillTooLow {
                    skill: gate.skill,
                    required: gate.level,
                    actual,
                });
            }
            Some(_) => {}
        }
    }

    failures
}
