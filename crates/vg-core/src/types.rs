use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VizError;

/// Layout algorithm the rendering backend should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Circo,
    Dot,
    Neato,
    Osage,
    Twopi,
    Fdp,
}

impl Engine {
    pub const ALL: [Engine; 6] = [
        Engine::Circo,
        Engine::Dot,
        Engine::Neato,
        Engine::Osage,
        Engine::Twopi,
        Engine::Fdp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Circo => "circo",
            Self::Dot => "dot",
            Self::Neato => "neato",
            Self::Osage => "osage",
            Self::Twopi => "twopi",
            Self::Fdp => "fdp",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = VizError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|engine| engine.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| {
                VizError::new(
                    "CONFIG_UNKNOWN_ENGINE",
                    format!("Unknown layout engine \"{}\".", raw),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Png,
    Svg,
    SvgStandalone,
    Xdot,
    Plain,
    PlainExt,
    Ps,
    Ps2,
    Json,
    Json0,
}

impl Format {
    pub const ALL: [Format; 10] = [
        Format::Png,
        Format::Svg,
        Format::SvgStandalone,
        Format::Xdot,
        Format::Plain,
        Format::PlainExt,
        Format::Ps,
        Format::Ps2,
        Format::Json,
        Format::Json0,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::SvgStandalone => "svg-standalone",
            Self::Xdot => "xdot",
            Self::Plain => "plain",
            Self::PlainExt => "plain-ext",
            Self::Ps => "ps",
            Self::Ps2 => "ps2",
            Self::Json => "json",
            Self::Json0 => "json0",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = VizError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| {
                VizError::new(
                    "CONFIG_UNKNOWN_FORMAT",
                    format!("Unknown output format \"{}\".", raw),
                )
            })
    }
}

/// Options forwarded to the rendering runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VizjsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_memory: Option<u64>,
}

impl VizjsOptions {
    pub fn with_total_memory(total_memory: u64) -> Self {
        Self {
            total_memory: Some(total_memory),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRequest {
    pub src: String,
    pub engine: Engine,
    pub format: Format,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<VizjsOptions>,
}

impl EngineRequest {
    pub fn new(src: impl Into<String>, engine: Engine, format: Format) -> Self {
        Self {
            src: src.into(),
            engine,
            format,
            options: None,
        }
    }

    pub fn with_options(mut self, options: VizjsOptions) -> Self {
        self.options = Some(options);
        self
    }
}
