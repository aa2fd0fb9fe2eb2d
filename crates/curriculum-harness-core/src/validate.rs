//! Course validation: hard errors that block storage and soft warnings for
//! human review.

use crate::models::{Course, ValidationReport};

/// Validate an assembled course.
///
/// Errors: missing name, missing identifier, no modules, unnamed module.
/// Warnings: missing hour figure, no capabilities, no knowledge items.
pub fn validate_course(course: &Course) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if course.name.trim().is_empty() {
        errors.push("course name is missing".to_string());
    }
    if course.id.trim().is_empty() {
        errors.push("course identifier is missing".to_string());
    }
    if course.modules.is_empty() {
        errors.push("course has no modules".to_string());
    }

    for (i, module) in course.modules.iter().enumerate() {
        if module.name.trim().is_empty() {
            errors.push(format!("module #{} has no name", i + 1));
            continue;
        }
        if module.hours.is_none() {
            warnings.push(format!("module '{}' has no hour figure", module.name));
        }
        if module.capabilities.is_empty() {
            warnings.push(format!("module '{}' has no capabilities", module.name));
        }
        if module.knowledge.is_empty() {
            warnings.push(format!("module '{}' has no knowledge items", module.name));
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
