//! Weapon Category Labels

/// Canonical category for a detector label.
///
/// Spelling variants collapse to one name so cooldown keys and remote
/// records are never split across them. Unknown labels pass through
/// lower-cased.
pub fn normalize_category(label: &str) -> String {
    let lower = label.trim().to_lowercase();
    match lower.as_str() {
        "gun" | "pistol" => "pistol".to_string(),
        "heavy-weapon" | "heavy_weapon" => "heavy_weapon".to_string(),
        "knife" => "knife".to_string(),
        _ => lower,
    }
}

/// Human-readable name for notifications
pub fn display_name(label: &str) -> String {
    match label {
        "gun" | "pistol" => "Pistol".to_string(),
        "heavy-weapon" | "heavy_weapon" => "Heavy Weapon".to_string(),
        "knife" => "Knife".to_string(),
        other => other.replace(['-', '_'], " "),
    }
}
