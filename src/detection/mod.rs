// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Detection module - per-frame detections, the alert latch and the cooldown gate

mod latch;
mod cooldown;

pub use latch::*;
pub use cooldown::*;

use std::collections::BTreeMap;
use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::trace;

/// Label assigned by the pose model to one subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Normal,
    Fall,
}

/// Body parts reported by the pose model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    #[serde(rename = "nose")]
    Nose,
    #[serde(rename = "left eye")]
    LeftEye,
    #[serde(rename = "right eye")]
    RightEye,
    #[serde(rename = "left ear")]
    LeftEar,
    #[serde(rename = "right ear")]
    RightEar,
    #[serde(rename = "left shoulder")]
    LeftShoulder,
    #[serde(rename = "right shoulder")]
    RightShoulder,
    #[serde(rename = "left elbow")]
    LeftElbow,
    #[serde(rename = "right elbow")]
    RightElbow,
    #[serde(rename = "left wrist")]
    LeftWrist,
    #[serde(rename = "right wrist")]
    RightWrist,
    #[serde(rename = "left hip")]
    LeftHip,
    #[serde(rename = "right hip")]
    RightHip,
    #[serde(rename = "left knee")]
    LeftKnee,
    #[serde(rename = "right knee")]
    RightKnee,
    #[serde(rename = "left ankle")]
    LeftAnkle,
    #[serde(rename = "right ankle")]
    RightAnkle,
}

impl BodyPart {
    /// Part for a model keypoint name, `None` for names outside the set
    pub fn from_name(name: &str) -> Option<Self> {
        let de: StrDeserializer<'_, ValueError> = name.into_deserializer();
        Self::deserialize(de).ok()
    }
}

/// Image-space coordinate of a keypoint, serialized as `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f32, pub f32);

impl Point {
    pub fn x(&self) -> f32 {
        self.0
    }

    pub fn y(&self) -> f32 {
        self.1
    }
}

/// Keypoints keyed by body part. Parts the model did not locate are absent.
pub type Keypoints = BTreeMap<BodyPart, Point>;

fn coordinate(value: &Value) -> Option<Point> {
    match value.as_array()?.as_slice() {
        [x, y, ..] => Some(Point(x.as_f64()? as f32, y.as_f64()? as f32)),
        _ => None,
    }
}

/// Keypoints from a model response. Entries with an unknown name or a
/// missing coordinate are dropped instead of failing the whole detection.
fn lenient_keypoints<'de, D>(deserializer: D) -> Result<Keypoints, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;

    let mut keypoints = Keypoints::new();
    for (name, value) in raw.unwrap_or_default() {
        match (BodyPart::from_name(&name), coordinate(&value)) {
            (Some(part), Some(point)) => {
                keypoints.insert(part, point);
            }
            _ => trace!("Dropping keypoint {:?}: {}", name, value),
        }
    }
    Ok(keypoints)
}

/// One inference output for one subject in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: Label,
    #[serde(default, deserialize_with = "lenient_keypoints")]
    pub keypoints: Keypoints,
    pub score: f32,
}

impl Detection {
    pub fn new(label: Label, score: f32) -> Self {
        Self {
            label,
            keypoints: Keypoints::new(),
            score,
        }
    }

    pub fn with_keypoint(mut self, part: BodyPart, x: f32, y: f32) -> Self {
        self.keypoints.insert(part, Point(x, y));
        self
    }

    pub fn is_fall(&self) -> bool {
        self.label == Label::Fall
    }
}

/// Detections for one frame, in model order. Empty when no inference ran.
pub type DetectionResult = Vec<Detection>;

/// True when any detection in the result carries the fall label
pub fn contains_fall(result: &[Detection]) -> bool {
    result.iter().any(Detection::is_fall)
}
