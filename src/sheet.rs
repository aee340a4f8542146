//! Scene line annotation for the report body.
//!
//! Decides per line whether it shows, where its scene bar starts and
//! stops, and which continuation markers stay hidden.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Layout units in the browser differ from print units by this factor
const PRINT_SCALE: f64 = 1.3;

/// Continuation markers that keep a bar visible outside a true scene
const CONT_EXEMPT: [&str; 2] = ["CONTINUE", "CONTINUE-TOP"];

/// Scene bar state of a line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bar {
    #[default]
    #[serde(rename = "")]
    None,
    /// Requested by the client; becomes `Hidden` unless it opens a scene
    #[serde(rename = "bar")]
    Requested,
    #[serde(rename = "start-bar")]
    Start,
    #[serde(rename = "hide-bar")]
    Hidden,
    /// Hidden because the scene ended or continues elsewhere
    #[serde(rename = "hideBar")]
    Closed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineRecord {
    pub category: String,
    pub sub_category: String,
    pub calculated_ypos: String,
    pub calculated_end: String,
    pub y_pos: f64,
    pub x_pos: f64,
    pub end_y: f64,
    pub visible: String,
    pub bar: Bar,
    pub scene_index: i64,
    pub true_scene: String,
    pub end: String,
    pub cont: String,
    pub hide_end: String,
    pub hide_cont: String,
    pub scene_number_text: String,
    pub hide_scene_number_text: String,
    pub text: String,
}

/// Annotate every line of every page, in reading order.
///
/// A scene's bar starts on the first line of that scene that requests
/// one; scene 0 never gets a bar.
pub fn annotate(pages: Vec<Vec<LineRecord>>) -> Vec<Vec<LineRecord>> {
    let mut started = HashSet::new();

    pages
        .into_iter()
        .map(|page| {
            page.into_iter()
                .map(|line| annotate_line(line, &mut started))
                .collect()
        })
        .collect()
}

fn annotate_line(mut line: LineRecord, started: &mut HashSet<i64>) -> LineRecord {
    if line.category == "injected-break" {
        line.bar = Bar::None;
        line.visible = "false".into();
    }

    line.y_pos = parse_or_zero(&line.calculated_ypos) / PRINT_SCALE;
    if !line.calculated_end.is_empty() {
        line.end_y = parse_or_zero(&line.calculated_end) / PRINT_SCALE;
    }

    if line.sub_category == "CON'T" {
        line.visible = "true".into();
    }

    if line.bar == Bar::Requested && line.scene_index > 0 && !started.contains(&line.scene_index) {
        started.insert(line.scene_index);
    } else {
        line.bar = Bar::Hidden;
    }

    if line.category == "scene-header" && line.visible == "true" {
        line.true_scene = "true-scene".into();
        line.bar = Bar::Start;
        line.hide_end = "hideEnd".into();
        line.hide_cont = "hideCont".into();
        line.end_y = line.y_pos;
    }

    let in_scene = started.contains(&line.scene_index);

    if line.end == "END" && in_scene {
        line.end_y = line.y_pos - 5.0;
        line.hide_cont = "hideCont".into();
        line.bar = Bar::Closed;
    }

    if !line.cont.is_empty() && line.cont != "hideCont" && in_scene && line.bar != Bar::Start {
        line.hide_end = "hideEnd".into();
        line.bar = Bar::Closed;
    } else if line.true_scene.is_empty() && !CONT_EXEMPT.contains(&line.cont.as_str()) {
        line.bar = Bar::Closed;
    }

    if !line.scene_number_text.is_empty() && line.category != "scene-header" {
        line.hide_scene_number_text = "hidden".into();
    }

    line
}

fn parse_or_zero(s: &str) -> f64 {
    s.parse().unwrap_or(0.0)
}

/// Annotate a JSON array of pages of line records
pub fn annotate_json(json: &str) -> serde_json::Result<String> {
    let pages: Vec<Vec<LineRecord>> = serde_json::from_str(json)?;
    serde_json::to_string(&annotate(pages))
}
