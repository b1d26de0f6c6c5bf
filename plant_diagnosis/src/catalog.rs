/// Class labels in the order of the classifier's output layer.
///
/// Index `i` of the probability vector maps to `CLASS_NAMES[i]`; this order is
/// fixed by the trained checkpoint and must not be changed on its own.
pub const CLASS_NAMES: [&str; 15] = [
    "Pepper__bell___Bacterial_spot",
    "Pepper__bell___healthy",
    "Potato___Early_blight",
    "Potato___Late_blight",
    "Potato___healthy",
    "Tomato_Bacterial_spot",
    "Tomato_Early_blight",
    "Tomato_Late_blight",
    "Tomato_Leaf_Mold",
    "Tomato_Septoria_leaf_spot",
    "Tomato_Spider_mites_Two_spotted_spider_mite",
    "Tomato__Target_Spot",
    "Tomato__Tomato_YellowLeaf__Curl_Virus",
    "Tomato__Tomato_mosaic_virus",
    "Tomato_healthy",
];

pub fn class_count() -> usize {
    CLASS_NAMES.len()
}

pub fn class_key(index: usize) -> Option<&'static str> {
    CLASS_NAMES.get(index).copied()
}

/// Human readable form of a catalog key: `Tomato_Septoria_leaf_spot` becomes
/// `Tomato Septoria Leaf Spot`. Every underscore becomes one space, so doubled
/// separators stay doubled.
pub fn display_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    let mut in_word = false;
    for c in key.chars().map(|c| if c == '_' { ' ' } else { c }) {
        if in_word {
            name.extend(c.to_lowercase());
        } else {
            name.extend(c.to_uppercase());
        }
        in_word = c.is_alphabetic();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order() {
        assert_eq!(class_count(), 15);
        assert_eq!(class_key(0), Some("Pepper__bell___Bacterial_spot"));
        assert_eq!(class_key(9), Some("Tomato_Septoria_leaf_spot"));
        assert_eq!(class_key(14), Some("Tomato_healthy"));
        assert_eq!(class_key(15), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            display_name("Tomato_Septoria_leaf_spot"),
            "Tomato Septoria Leaf Spot"
        );
        assert_eq!(display_name("Tomato_healthy"), "Tomato Healthy");
        assert_eq!(
            display_name("Pepper__bell___Bacterial_spot"),
            "Pepper  Bell   Bacterial Spot"
        );
        assert_eq!(
            display_name("Tomato__Tomato_YellowLeaf__Curl_Virus"),
            "Tomato  Tomato Yellowleaf  Curl Virus"
        );
        assert_eq!(
            display_name("Potato___Early_blight"),
            "Potato   Early Blight"
        );
    }
}
