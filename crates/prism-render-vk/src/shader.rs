// SPDX-License-Identifier: CEPL-1.0
use ash::util::read_spv;
use std::io::{self, Cursor};
use std::path::PathBuf;
use tracing::debug;

use crate::error::VkError;

/// SPIR-V compiled by the build script.
const EMBEDDED: &[(&str, &[u8])] = &[
    (
        "triangle.vert.spv",
        include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv")),
    ),
    (
        "triangle.frag.spv",
        include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv")),
    ),
];

/// Resolves shader identifiers to SPIR-V words. A file in the override
/// directory shadows the embedded binary of the same name.
#[derive(Clone, Debug, Default)]
pub struct ShaderLoader {
    dir: Option<PathBuf>,
}

impl ShaderLoader {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn load(&self, id: &str) -> Result<Vec<u32>, VkError> {
        let wrap = |source: io::Error| VkError::Shader {
            id: id.to_owned(),
            source,
        };

        if let Some(path) = self.dir.as_ref().map(|d| d.join(id)) {
            if path.is_file() {
                debug!("shader {id} from {}", path.display());
                let bytes = std::fs::read(&path).map_err(wrap)?;
                return read_spv(&mut Cursor::new(&bytes[..])).map_err(wrap);
            }
        }

        let (_, bytes) = EMBEDDED
            .iter()
            .find(|(name, _)| *name == id)
            .ok_or_else(|| wrap(io::Error::new(io::ErrorKind::NotFound, "no such shader")))?;
        read_spv(&mut Cursor::new(*bytes)).map_err(wrap)
    }
}
