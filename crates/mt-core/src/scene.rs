//! Map/token provider seam.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{GridMetrics, TokenId, TokenSample, Vec2};

pub type SceneId = String;

fn one() -> f64 {
    1.0
}

/// A placed token as the map stores it: top-left corner in px, footprint in
/// grid cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    #[serde(default)]
    pub id: TokenId,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "one")]
    pub width: f64,
    #[serde(default = "one")]
    pub height: f64,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub actor_id: Option<String>,
    /// Active status-effect ids of the token's actor.
    #[serde(default)]
    pub statuses: Vec<String>,
    #[serde(default)]
    pub player_owned: bool,
}

impl TokenRecord {
    pub fn new(id: &str, x: f64, y: f64) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            x,
            y,
            width: 1.0,
            height: 1.0,
            scale: 1.0,
            hidden: false,
            actor_id: None,
            statuses: Vec::new(),
            player_owned: false,
        }
    }

    pub fn center(&self, grid: &GridMetrics) -> Vec2 {
        Vec2::new(
            self.x + 0.5 * self.width * self.scale * grid.cell_size_px,
            self.y + 0.5 * self.height * self.scale * grid.cell_size_px,
        )
    }

    pub fn sample(&self, grid: &GridMetrics) -> TokenSample {
        TokenSample {
            id: self.id.clone(),
            center: self.center(grid),
            statuses: self.statuses.clone(),
            player_controlled: self.player_owned,
            hidden: self.hidden,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: SceneId,
    #[serde(default)]
    pub name: String,
    pub grid: GridMetrics,
    #[serde(default)]
    pub tokens: Vec<TokenRecord>,
}

impl Scene {
    pub fn token(&self, id: &str) -> Option<&TokenRecord> {
        self.tokens.iter().find(|t| t.id == id)
    }

    pub fn samples(&self) -> Vec<TokenSample> {
        self.tokens.iter().map(|t| t.sample(&self.grid)).collect()
    }
}

/// Read access to scenes and their tokens.
pub trait MapProvider {
    fn scene(&self, id: &str) -> Option<&Scene>;
}

impl MapProvider for HashMap<SceneId, Scene> {
    fn scene(&self, id: &str) -> Option<&Scene> {
        self.get(id)
    }
}

impl MapProvider for Scene {
    fn scene(&self, id: &str) -> Option<&Scene> {
        (self.id == id).then_some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_uses_cell_footprint() {
        let grid = GridMetrics::new(100.0, 5.0, "ft");
        let mut t = TokenRecord::new("a", 200.0, 300.0);
        assert_eq!(t.center(&grid), Vec2::new(250.0, 350.0));

        t.width = 2.0;
        t.height = 2.0;
        t.scale = 1.5;
        assert_eq!(t.center(&grid), Vec2::new(350.0, 450.0));
    }

    #[test]
    fn test_sample_carries_flags() {
        let grid = GridMetrics::new(50.0, 1.5, "m");
        let mut t = TokenRecord::new("a", 0.0, 0.0);
        t.hidden = true;
        t.player_owned = true;
        t.statuses = vec!["stunned".into()];

        let s = t.sample(&grid);
        assert!(s.hidden);
        assert!(s.player_controlled);
        assert_eq!(s.statuses, vec!["stunned".to_string()]);
        assert_eq!(s.center, Vec2::new(25.0, 25.0));
    }

    #[test]
    fn test_scene_as_provider() {
        let scene = Scene {
            id: "deck".into(),
            name: "Deck".into(),
            grid: GridMetrics::new(100.0, 5.0, "ft"),
            tokens: vec![TokenRecord::new("a", 0.0, 0.0)],
        };
        assert!(scene.scene("deck").is_some());
        assert!(scene.scene("other").is_none());
        assert!(scene.token("a").is_some());
        assert!(scene.token("b").is_none());
    }
}
