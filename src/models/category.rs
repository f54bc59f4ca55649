use serde::{Deserialize, Serialize};

/// Category key whose recipes are served straight from the bundle and never stored.
pub const SEASONING_CATEGORY: &str = "seasoning";

const OTHER_DISPLAY_NAME: &str = "其他";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub icon: String,
    pub sort_order: i64,
    pub recipe_count: i64,
}

impl Category {
    /// Builds the category record the importer derives for `key`.
    pub fn derived(key: &str, sort_order: i64, recipe_count: i64) -> Self {
        let display = display_name(key);
        Self {
            id: key.to_string(),
            name: key.to_string(),
            display_name: display.to_string(),
            description: format!("{display}类菜品"),
            icon: String::new(),
            sort_order,
            recipe_count,
        }
    }
}

pub fn display_name(key: &str) -> &'static str {
    match key {
        "staple" => "主食",
        "stir_fry" => "炒菜",
        "stew" => "炖菜",
        "steam" => "蒸菜",
        "grill" => "烤类",
        "fried" => "炸品",
        "cold_dish" => "凉拌",
        "braised" => "卤菜",
        "breakfast" => "早餐",
        "soup" => "汤",
        "blanched" => "烫菜",
        "casserole" => "砂锅菜",
        "hot_pot" => "煮锅",
        "beverage" => "饮品",
        SEASONING_CATEGORY => "菜谱配料",
        _ => OTHER_DISPLAY_NAME,
    }
}
