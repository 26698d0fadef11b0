//! World description file: users, scenes and tokens in TOML.
//!
//! ```toml
//! [[users]]
//! id = "gm"
//! role = "gamemaster"
//!
//! [[users]]
//! id = "ripley"
//! controls = ["marine"]
//!
//! [[scenes]]
//! id = "deck"
//! grid = { cellSizePx = 100, distancePerCell = 5, unitLabel = "m" }
//!
//! [[scenes.tokens]]
//! id = "marine"
//! x = 0
//! y = 0
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mt_core::{AuthorityLevel, MapProvider, Roster, Scene, TokenId, UserId};

use crate::error::{Result, StoreError};

const GENERATED_ID_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: AuthorityLevel,
    /// Tokens this user controls, first one is the default reference.
    #[serde(default)]
    pub controls: Vec<TokenId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl World {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        let world = Self::from_toml_str(&text)?;
        tracing::debug!(
            "loaded {} scenes, {} users from {}",
            world.scenes.len(),
            world.users.len(),
            path.display()
        );
        Ok(world)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut world: World = toml::from_str(text)?;
        world.prepare()?;
        Ok(world)
    }

    pub fn roster(&self) -> Roster {
        self.users.iter().map(|u| (u.id.as_str(), u.role)).collect()
    }

    pub fn user(&self, id: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn controlled_tokens(&self, user: &str) -> &[TokenId] {
        self.user(user)
            .map(|u| u.controls.as_slice())
            .unwrap_or_default()
    }

    pub fn scene_mut(&mut self, id: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id == id)
    }

    /// Fill generated ids, reject broken grids and duplicate ids, and mark
    /// tokens controlled by unprivileged users as player-owned.
    fn prepare(&mut self) -> Result<()> {
        let mut scene_ids = HashSet::new();
        for scene in &mut self.scenes {
            if !scene_ids.insert(scene.id.clone()) {
                return Err(StoreError::InvalidData(format!(
                    "duplicate scene id '{}'",
                    scene.id
                )));
            }
            if !scene.grid.is_valid() {
                return Err(StoreError::InvalidData(format!(
                    "scene '{}' has an invalid grid",
                    scene.id
                )));
            }

            let mut token_ids = HashSet::new();
            for token in &mut scene.tokens {
                if token.id.is_empty() {
                    token.id = generate_id();
                    tracing::debug!("generated id {} for token {:?}", token.id, token.name);
                }
                if !token_ids.insert(token.id.clone()) {
                    return Err(StoreError::InvalidData(format!(
                        "duplicate token id '{}' in scene '{}'",
                        token.id, scene.id
                    )));
                }
            }
        }

        let player_tokens: HashSet<&str> = self
            .users
            .iter()
            .filter(|u| !u.role.is_privileged())
            .flat_map(|u| u.controls.iter().map(String::as_str))
            .collect();
        for token in self.scenes.iter_mut().flat_map(|s| s.tokens.iter_mut()) {
            if player_tokens.contains(token.id.as_str()) {
                token.player_owned = true;
            }
        }
        Ok(())
    }
}

impl MapProvider for World {
    fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }
}

fn generate_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(GENERATED_ID_LEN);
    id
}
