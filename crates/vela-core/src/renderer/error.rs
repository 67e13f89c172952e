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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::memory::Bytes;
use crate::shaderpack::PassValidationError;
use std::fmt;

/// An error related to building a pipeline interface or pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Two shader stages declare the same resource name with different layouts.
    IncompatibleBinding {
        /// The pipeline being built.
        pipeline: String,
        /// The resource name both stages use.
        name: String,
    },
    /// The pipeline (after parent merge) has no vertex shader.
    MissingVertexShader {
        /// The pipeline being built.
        pipeline: String,
    },
    /// The pipeline names a parent that was never created.
    UnknownParent {
        /// The pipeline being built.
        pipeline: String,
        /// The missing parent.
        parent: String,
    },
    /// The pipeline renders in a pass that was never registered.
    UnknownPass {
        /// The pipeline being built.
        pipeline: String,
        /// The missing pass.
        pass: String,
    },
    /// Failed to create the descriptor set or pipeline layout.
    LayoutCreationFailed(String),
    /// The backend failed to compile the pipeline state object.
    CompilationFailed {
        /// The pipeline being built.
        pipeline: String,
        /// Message from the backend.
        details: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::IncompatibleBinding { pipeline, name } => write!(
                f,
                "Pipeline '{pipeline}' declares binding '{name}' with incompatible layouts in different stages"
            ),
            PipelineError::MissingVertexShader { pipeline } => {
                write!(f, "Pipeline '{pipeline}' has no vertex shader")
            }
            PipelineError::UnknownParent { pipeline, parent } => {
                write!(f, "Pipeline '{pipeline}' inherits from unknown pipeline '{parent}'")
            }
            PipelineError::UnknownPass { pipeline, pass } => {
                write!(f, "Pipeline '{pipeline}' renders in unknown pass '{pass}'")
            }
            PipelineError::LayoutCreationFailed(msg) => {
                write!(f, "Pipeline layout creation failed: {msg}")
            }
            PipelineError::CompilationFailed { pipeline, details } => {
                write!(f, "Pipeline compilation failed for '{pipeline}': {details}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The device ran out of memory for the requested object.
    OutOfDeviceMemory {
        /// Number of bytes that were requested.
        requested: Bytes,
    },
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A render pass description failed structural validation.
    InvalidPass(PassValidationError),
    /// A named resource could not be found.
    NotFound(String),
    /// The handle used to reference a resource is not known to this device.
    InvalidHandle,
    /// An error reported by the native graphics API.
    BackendError(String),
    /// A memory pool was configured with an alignment that is not a power of two.
    InvalidAlignment {
        /// Name of the pool.
        pool: &'static str,
        /// The rejected alignment.
        alignment: Bytes,
    },
    /// An access went past the end of a resource.
    OutOfBounds {
        /// Requested end of the access.
        end: Bytes,
        /// Size of the resource.
        size: Bytes,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::OutOfDeviceMemory { requested } => {
                write!(f, "Out of device memory while allocating {requested}")
            }
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::InvalidPass(err) => write!(f, "Invalid render pass: {err}"),
            ResourceError::NotFound(name) => write!(f, "Resource '{name}' not found."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::InvalidAlignment { pool, alignment } => write!(
                f,
                "Alignment of the {pool} pool must be a power of two, got {alignment}"
            ),
            ResourceError::OutOfBounds { end, size } => {
                write!(f, "Resource access out of bounds: end {end} exceeds size {size}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Pipeline(err) => Some(err),
            ResourceError::InvalidPass(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

impl From<PassValidationError> for ResourceError {
    fn from(err: PassValidationError) -> Self {
        ResourceError::InvalidPass(err)
    }
}

/// A high-level error of the render device itself.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// No GPU satisfies the renderer's requirements.
    NoCompatibleDevice,
    /// A required instance or device extension is not available.
    MissingExtension(String),
    /// The graphics device was lost (e.g., GPU driver crashed or was updated).
    /// This is a catastrophic error that typically requires reinitialization.
    DeviceLost,
    /// The queue rejected a submission.
    SubmissionFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::NoCompatibleDevice => {
                write!(f, "No compatible GPU was found.")
            }
            RenderError::MissingExtension(name) => {
                write!(f, "Required extension '{name}' is not supported.")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
            RenderError::SubmissionFailed(msg) => {
                write!(f, "Queue submission failed: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

/// A command was recorded in a state that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandListError {
    /// The list was already finished or submitted.
    NotRecording,
    /// A draw or pass-scoped command was recorded outside a render pass.
    RenderPassNotBegun,
    /// A render pass was begun while another one is active.
    RenderPassAlreadyActive,
    /// The list was finished while a render pass is still active.
    RenderPassStillActive,
    /// A copy range exceeds one of the buffers.
    OutOfBounds {
        /// Requested end of the range.
        end: Bytes,
        /// Size of the buffer.
        size: Bytes,
    },
    /// The command is not allowed at this list level.
    WrongLevel,
    /// The command does not match how the active render pass records its contents:
    /// inline commands in a pass of secondary lists, or secondary lists in an inline pass.
    SubpassContentsMismatch,
    /// A handle passed to the command was not created by this device.
    InvalidHandle,
}

impl fmt::Display for CommandListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandListError::NotRecording => {
                write!(f, "Command list is no longer recording.")
            }
            CommandListError::RenderPassNotBegun => {
                write!(f, "Command requires an active render pass.")
            }
            CommandListError::RenderPassAlreadyActive => {
                write!(f, "A render pass is already active.")
            }
            CommandListError::RenderPassStillActive => {
                write!(f, "The active render pass must be ended first.")
            }
            CommandListError::OutOfBounds { end, size } => {
                write!(f, "Copy range ends at {end} but the buffer holds {size}.")
            }
            CommandListError::WrongLevel => {
                write!(f, "Command is not allowed for this command list level.")
            }
            CommandListError::SubpassContentsMismatch => write!(
                f,
                "Command does not match the contents of the active render pass."
            ),
            CommandListError::InvalidHandle => {
                write!(f, "Command references a resource this device does not know.")
            }
        }
    }
}

impl std::error::Error for CommandListError {}

impl From<CommandListError> for RenderError {
    fn from(err: CommandListError) -> Self {
        RenderError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn pipeline_error_display() {
        let err = PipelineError::IncompatibleBinding {
            pipeline: "Terrain".to_string(),
            name: "albedo".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Pipeline 'Terrain' declares binding 'albedo' with incompatible layouts in different stages"
        );
    }

    #[test]
    fn render_error_chains_down_to_pass_validation() {
        let pass_err = PassValidationError::BackbufferCombinedWithOtherOutputs {
            pass: "Final".to_string(),
        };
        let res_err: ResourceError = pass_err.into();
        let render_err: RenderError = res_err.into();
        assert!(render_err.to_string().starts_with("Graphics resource operation failed: Invalid render pass:"));
        assert!(render_err.source().is_some());
        assert!(render_err.source().unwrap().source().is_some());
    }

    #[test]
    fn out_of_bounds_reports_sizes() {
        let err = ResourceError::OutOfBounds {
            end: Bytes::new(96),
            size: Bytes::new(64),
        };
        assert_eq!(
            format!("{err}"),
            "Resource access out of bounds: end 96 B exceeds size 64 B"
        );
    }
}
