//! Linked shader programs and their name lookups.

use std::collections::HashMap;

use crate::device::{created, GraphicsDevice};
use crate::error::{Error, Result};
use crate::types::ShaderStage;

/// A linked and validated vertex + fragment program.
///
/// Attribute and uniform locations are looked up once per name. Names the
/// program does not declare (or that the linker optimized away) are cached as
/// misses and skipped on every later draw.
#[derive(Debug)]
pub struct ShaderProgram<D: GraphicsDevice> {
    handle: D::Program,
    vertex: D::Shader,
    fragment: D::Shader,
    attributes: HashMap<String, Option<u32>>,
    uniforms: HashMap<String, Option<D::UniformLocation>>,
}

impl<D: GraphicsDevice> ShaderProgram<D> {
    /// Compile both stages, link, and validate.
    ///
    /// Every device object created along the way is deleted again when a
    /// step fails.
    ///
    /// # Errors
    ///
    /// [`Error::CompileError`] with the stage's info log,
    /// [`Error::LinkError`] with the program's info log, or
    /// [`Error::ObjectCreation`].
    pub(crate) fn new(device: &D, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        let vertex = compile_shader(device, ShaderStage::Vertex, vertex_src)?;
        let fragment = match compile_shader(device, ShaderStage::Fragment, fragment_src) {
            Ok(fragment) => fragment,
            Err(e) => {
                device.delete_shader(vertex);
                return Err(e);
            }
        };
        let handle = match created(device.create_program()) {
            Ok(handle) => handle,
            Err(e) => {
                device.delete_shader(vertex);
                device.delete_shader(fragment);
                return Err(e);
            }
        };

        let program = Self {
            handle,
            vertex,
            fragment,
            attributes: HashMap::new(),
            uniforms: HashMap::new(),
        };
        device.attach_shader(handle, vertex);
        device.attach_shader(handle, fragment);

        let phase = if !device.link_program(handle) {
            "linking"
        } else if !device.validate_program(handle) {
            "validating"
        } else {
            return Ok(program);
        };
        let log = device.program_info_log(handle);
        program.destroy(device);
        Err(Error::LinkError { phase, log })
    }

    /// Attribute location for `name`, or `None` if the program has none.
    pub(crate) fn attribute_location(&mut self, device: &D, name: &str) -> Option<u32> {
        if let Some(location) = self.attributes.get(name) {
            return *location;
        }
        let location = device.attribute_location(self.handle, name);
        if location.is_none() {
            log::debug!("attribute `{name}` not found in program {:?}", self.handle);
        }
        self.attributes.insert(name.to_owned(), location);
        location
    }

    /// Uniform location for `name`, or `None` if the program has none.
    pub(crate) fn uniform_location(&mut self, device: &D, name: &str) -> Option<D::UniformLocation> {
        if let Some(location) = self.uniforms.get(name) {
            return location.clone();
        }
        let location = device.uniform_location(self.handle, name);
        if location.is_none() {
            log::debug!("uniform `{name}` not found in program {:?}", self.handle);
        }
        self.uniforms.insert(name.to_owned(), location.clone());
        location
    }

    pub(crate) fn destroy(self, device: &D) {
        device.detach_shader(self.handle, self.vertex);
        device.detach_shader(self.handle, self.fragment);
        device.delete_shader(self.vertex);
        device.delete_shader(self.fragment);
        device.delete_program(self.handle);
    }

    /// The device handle.
    pub fn handle(&self) -> D::Program {
        self.handle
    }
}

fn compile_shader<D: GraphicsDevice>(
    device: &D,
    stage: ShaderStage,
    source: &str,
) -> Result<D::Shader> {
    let shader = created(device.create_shader(stage))?;
    if !device.compile_shader(shader, source) {
        let log = device.shader_info_log(shader);
        device.delete_shader(shader);
        return Err(Error::CompileError { stage, log });
    }
    Ok(shader)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{Command, RecordingDevice};

    const VS: &str = "void main() { gl_Position = vec4(0.0); }";
    const FS: &str = "void main() {}";

    #[test]
    fn compile_failure_names_the_stage_and_cleans_up() {
        let device = RecordingDevice::new().failing_compile(ShaderStage::Fragment);
        let err = ShaderProgram::new(&device, VS, FS).unwrap_err();

        match err {
            Error::CompileError { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("fragment"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn link_failure_deletes_everything() {
        let device = RecordingDevice::new().failing_link();
        let err = ShaderProgram::new(&device, VS, FS).unwrap_err();
        assert!(matches!(err, Error::LinkError { phase: "linking", .. }));
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn validate_failure_is_reported_as_such() {
        let device = RecordingDevice::new().failing_validate();
        let err = ShaderProgram::new(&device, VS, FS).unwrap_err();
        assert!(matches!(err, Error::LinkError { phase: "validating", .. }));
        assert!(err.to_string().starts_with("error while validating"));
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn locations_are_cached_including_misses() {
        let device = RecordingDevice::new()
            .with_attribute("a_position", 0)
            .with_uniform("u_color");
        let mut program = ShaderProgram::new(&device, VS, FS).unwrap();

        for _ in 0..3 {
            assert_eq!(program.attribute_location(&device, "a_position"), Some(0));
            assert_eq!(program.attribute_location(&device, "a_missing"), None);
            assert!(program.uniform_location(&device, "u_color").is_some());
            assert!(program.uniform_location(&device, "u_missing").is_none());
        }
        assert_eq!(device.location_queries(), 4);
    }

    #[test]
    fn destroy_detaches_and_deletes() {
        let device = RecordingDevice::new();
        let program = ShaderProgram::new(&device, VS, FS).unwrap();
        let handle = program.handle();
        program.destroy(&device);

        assert!(device.commands().contains(&Command::DeleteProgram(handle)));
        assert_eq!(device.live_objects(), 0);
    }
}
