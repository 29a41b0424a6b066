use serde::{Deserialize, Serialize};
use std::fmt;

/// A camera angle used to request one image of the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewpoint {
    Front,
    Back,
    Top,
    Left,
    Right,
}

impl Viewpoint {
    /// Every viewpoint, in the order images are requested.
    pub const ALL: [Viewpoint; 5] = [
        Viewpoint::Front,
        Viewpoint::Back,
        Viewpoint::Top,
        Viewpoint::Left,
        Viewpoint::Right,
    ];

    /// Lowercase name used in request prompts and file names.
    pub fn label(self) -> &'static str {
        match self {
            Viewpoint::Front => "front",
            Viewpoint::Back => "back",
            Viewpoint::Top => "top",
            Viewpoint::Left => "left",
            Viewpoint::Right => "right",
        }
    }

    /// The text-to-image prompt for this viewpoint of `prompt`.
    pub fn request_prompt(self, prompt: &str) -> String {
        format!("{} viewpoint of {}", self.label(), prompt)
    }

    /// Name of the image file written for this viewpoint.
    pub fn file_name(self) -> String {
        format!("{}.png", self.label())
    }
}

impl fmt::Display for Viewpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
