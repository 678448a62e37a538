//! MTL material parsing helpers.
//!
//! The share service stores texture payloads keyed by their original
//! filenames; the MTL file references them through `map_*`/`bump`
//! statements. This module extracts those references so a downloaded bundle
//! can be cross-checked for missing textures.

use std::sync::LazyLock;

use regex::Regex;

static TEXTURE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:map_Kd|map_Ka|map_Ks|map_Bump|map_d|bump)\s+(\S.*?)\s*$")
        .expect("texture statement regex")
});

/// Extract texture filenames referenced by an MTL file.
///
/// Path components are stripped (the service keys textures by bare
/// filename), duplicates are removed, and first-seen order is preserved.
pub fn texture_refs(material: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in TEXTURE_LINE.captures_iter(material) {
        let name = filename_component(&caps[1]);
        if !name.is_empty() && !seen.iter().any(|s| s == &name) {
            seen.push(name);
        }
    }
    seen
}

/// Last path component of a texture reference, tolerating both separators.
fn filename_component(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MTL: &str = "\
# test material
newmtl head
Ka 0.8 0.8 0.8
Kd 0.8 0.8 0.8
map_Kd head_diffuse.jpg

newmtl body
map_Kd body_diffuse.png

newmtl arm
map_Kd arm_diffuse.jpg
map_Bump arm_normal.jpg

newmtl leg
map_Kd leg_diffuse.png
";

    #[test]
    fn test_extracts_all_texture_statements() {
        let refs = texture_refs(SAMPLE_MTL);
        assert_eq!(
            refs,
            vec![
                "head_diffuse.jpg",
                "body_diffuse.png",
                "arm_diffuse.jpg",
                "arm_normal.jpg",
                "leg_diffuse.png",
            ]
        );
    }

    #[test]
    fn test_strips_path_components() {
        let refs = texture_refs("map_Kd textures/wood.png\nbump C:\\assets\\bump.jpg\n");
        assert_eq!(refs, vec!["wood.png", "bump.jpg"]);
    }

    #[test]
    fn test_dedupes_repeated_references() {
        let refs = texture_refs("map_Kd skin.png\nmap_Ka skin.png\nmap_Ks skin.png\n");
        assert_eq!(refs, vec!["skin.png"]);
    }

    #[test]
    fn test_case_insensitive_statements() {
        let refs = texture_refs("MAP_KD upper.png\nMap_Bump mixed.jpg\n");
        assert_eq!(refs, vec!["upper.png", "mixed.jpg"]);
    }

    #[test]
    fn test_no_textures() {
        let refs = texture_refs("newmtl DefaultMaterial\nKd 0.8 0.8 0.8\n");
        assert!(refs.is_empty());
    }
}
