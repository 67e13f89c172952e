// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Structural validation of render pass descriptions.

use super::data::RenderPassCreateInfo;
use crate::math::Extent2D;
use std::fmt;

/// A render pass description that cannot be turned into a render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassValidationError {
    /// The pass writes to the backbuffer and to at least one other color target.
    BackbufferCombinedWithOtherOutputs {
        /// The offending pass.
        pass: String,
    },
    /// The backbuffer was declared as a depth target.
    BackbufferAsDepth {
        /// The offending pass.
        pass: String,
    },
    /// The pass declares more color outputs than the device supports.
    TooManyColorAttachments {
        /// The offending pass.
        pass: String,
        /// Number of color outputs declared.
        count: u32,
        /// Device limit.
        max: u32,
    },
    /// The framebuffer would have a zero width or height.
    EmptyFramebuffer {
        /// The offending pass.
        pass: String,
        /// The requested size.
        size: Extent2D,
    },
    /// The pass's attachments do not all have the same size.
    MismatchedAttachmentSizes {
        /// The offending pass.
        pass: String,
        /// The first attachment whose size differs.
        attachment: String,
    },
}

impl fmt::Display for PassValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassValidationError::BackbufferCombinedWithOtherOutputs { pass } => write!(
                f,
                "Pass '{pass}' writes to the backbuffer and to other textures; a backbuffer pass may only write to the backbuffer"
            ),
            PassValidationError::BackbufferAsDepth { pass } => {
                write!(f, "Pass '{pass}' uses the backbuffer as its depth target")
            }
            PassValidationError::TooManyColorAttachments { pass, count, max } => write!(
                f,
                "Pass '{pass}' has {count} color attachments but the device supports at most {max}"
            ),
            PassValidationError::EmptyFramebuffer { pass, size } => write!(
                f,
                "Pass '{pass}' has a framebuffer of {}x{}",
                size.width, size.height
            ),
            PassValidationError::MismatchedAttachmentSizes { pass, attachment } => write!(
                f,
                "Attachment '{attachment}' of pass '{pass}' does not match the size of the other attachments"
            ),
        }
    }
}

impl std::error::Error for PassValidationError {}

impl RenderPassCreateInfo {
    /// Checks the pass's outputs against the reserved backbuffer name and the device limit.
    pub fn validate(&self, max_color_attachments: u32) -> Result<(), PassValidationError> {
        if self.writes_to_backbuffer() && self.texture_outputs.len() > 1 {
            return Err(PassValidationError::BackbufferCombinedWithOtherOutputs {
                pass: self.name.clone(),
            });
        }

        if self
            .depth_texture
            .as_ref()
            .is_some_and(|depth| depth.is_backbuffer())
        {
            return Err(PassValidationError::BackbufferAsDepth {
                pass: self.name.clone(),
            });
        }

        let count = self.texture_outputs.len() as u32;
        if count > max_color_attachments {
            return Err(PassValidationError::TooManyColorAttachments {
                pass: self.name.clone(),
                count,
                max: max_color_attachments,
            });
        }

        Ok(())
    }

    /// Rejects framebuffers with a zero width or height.
    pub fn validate_framebuffer_size(&self, size: Extent2D) -> Result<(), PassValidationError> {
        if size.is_empty() {
            return Err(PassValidationError::EmptyFramebuffer {
                pass: self.name.clone(),
                size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaderpack::{PixelFormat, TextureAttachmentInfo, BACKBUFFER_NAME};

    fn output(name: &str) -> TextureAttachmentInfo {
        TextureAttachmentInfo {
            name: name.to_string(),
            pixel_format: PixelFormat::Rgba8,
            clear: true,
        }
    }

    fn pass(outputs: &[&str]) -> RenderPassCreateInfo {
        RenderPassCreateInfo {
            name: "Pass".to_string(),
            texture_outputs: outputs.iter().map(|name| output(name)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn backbuffer_alone_is_valid() {
        assert_eq!(pass(&[BACKBUFFER_NAME]).validate(8), Ok(()));
    }

    #[test]
    fn backbuffer_with_another_output_is_rejected() {
        let err = pass(&["Albedo", BACKBUFFER_NAME]).validate(8).unwrap_err();
        assert!(matches!(
            err,
            PassValidationError::BackbufferCombinedWithOtherOutputs { .. }
        ));
    }

    #[test]
    fn attachment_limit_is_enforced() {
        let err = pass(&["A", "B", "C"]).validate(2).unwrap_err();
        assert_eq!(
            err,
            PassValidationError::TooManyColorAttachments {
                pass: "Pass".to_string(),
                count: 3,
                max: 2,
            }
        );
    }

    #[test]
    fn backbuffer_cannot_be_depth() {
        let mut info = pass(&["Albedo"]);
        info.depth_texture = Some(output(BACKBUFFER_NAME));
        assert!(matches!(
            info.validate(8),
            Err(PassValidationError::BackbufferAsDepth { .. })
        ));
    }

    #[test]
    fn zero_sized_framebuffer_is_rejected() {
        let info = pass(&["Albedo"]);
        assert!(info.validate_framebuffer_size(Extent2D::new(0, 720)).is_err());
        assert!(info.validate_framebuffer_size(Extent2D::new(1280, 720)).is_ok());
    }
}
