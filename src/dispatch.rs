//! Binding a parameter sequence to a program and issuing the draw.
//!
//! A draw runs in three phases. Validation resolves every id and checks
//! the vertex stream lengths without touching the device, so a rejected draw
//! leaves no trace. Binding then uses the program, binds streams and uploads
//! uniforms in parameter order, and issues the draw. Finally every stream
//! that was bound is disabled again, even when binding or drawing failed
//! part-way.

use crate::buffer::GpuBuffer;
use crate::context::Context;
use crate::device::{check_errors, GraphicsDevice};
use crate::error::{Error, Result};
use crate::params::{Param, ParamValue};
use crate::program::ShaderProgram;
use crate::registry::{BufferId, ProgramId, Table, TextureId};
use crate::texture::Texture;
use crate::types::{BufferKind, PrimitiveKind, UniformValue};

/// How the draw is sized.
#[derive(Debug, Copy, Clone)]
enum DrawCall {
    Arrays { count: usize },
    Elements { indices: BufferId, count: usize },
}

impl<D: GraphicsDevice> Context<D> {
    /// Bind `params` to `program` and draw every vertex of the streams.
    ///
    /// Vertex streams bind to attributes, everything else to uniforms, both
    /// looked up by parameter name. Names the program does not use are
    /// skipped. `params` can be anything that yields `&Param`: an
    /// [`ImmutableList`](crate::ImmutableList), a
    /// [`MutableParameterSet`](crate::MutableParameterSet) or a slice.
    ///
    /// # Errors
    ///
    /// Rejected before any device call:
    /// [`Error::AttributeLengthMismatch`] if the streams disagree on length,
    /// [`Error::NoDrawableBuffers`] without any stream,
    /// [`Error::UnsupportedParameterType`] for an index buffer passed as a
    /// stream, and [`Error::Disposed`] or [`Error::UnknownResource`] for bad
    /// ids. While drawing: [`Error::AlreadyBound`] when one buffer feeds two
    /// attributes, and [`Error::DeviceError`] in debug mode.
    pub fn run_program<'p>(
        &mut self,
        program: ProgramId,
        params: impl IntoIterator<Item = &'p Param>,
        primitive: PrimitiveKind,
    ) -> Result<()> {
        self.dispatch(program, params, None, primitive)
    }

    /// Like [`run_program`](Self::run_program), but draw the vertices named
    /// by `indices`.
    ///
    /// # Errors
    ///
    /// As [`run_program`](Self::run_program), except that a draw without
    /// streams is allowed. [`Error::WrongBufferKind`] if `indices` is a
    /// vertex buffer.
    pub fn run_program_indexed<'p>(
        &mut self,
        program: ProgramId,
        params: impl IntoIterator<Item = &'p Param>,
        indices: BufferId,
        primitive: PrimitiveKind,
    ) -> Result<()> {
        self.dispatch(program, params, Some(indices), primitive)
    }

    fn dispatch<'p>(
        &mut self,
        program: ProgramId,
        params: impl IntoIterator<Item = &'p Param>,
        indices: Option<BufferId>,
        primitive: PrimitiveKind,
    ) -> Result<()> {
        let params: Vec<&Param> = params.into_iter().collect();
        let call = self.validate(program, &params, indices)?;

        let debug = self.config.debug_checks;
        let device = &self.device;
        let shader = self.programs.get_mut(program)?;
        let mut bound = Vec::new();

        let drawn = bind_and_draw(
            device,
            shader,
            &mut self.buffers,
            &self.textures,
            &params,
            call,
            primitive,
            debug,
            &mut bound,
        );
        let unwound = unbind(device, &mut self.buffers, &bound, call, debug);
        match drawn {
            Ok(()) => unwound,
            Err(e) => {
                if let Err(unwind_error) = unwound {
                    log::warn!("failed to unbind after a failed draw: {unwind_error}");
                }
                Err(e)
            }
        }
    }

    /// Resolve every id and size the draw. Issues no device call.
    fn validate(
        &self,
        program: ProgramId,
        params: &[&Param],
        indices: Option<BufferId>,
    ) -> Result<DrawCall> {
        self.programs.get(program)?;

        let mut streams: Option<usize> = None;
        for param in params {
            match param.value {
                ParamValue::VertexStream(id) => {
                    let buffer = self.buffers.get(id)?;
                    if buffer.kind() == BufferKind::Index {
                        return Err(Error::UnsupportedParameterType {
                            name: param.name.to_string(),
                            reason: "an index buffer cannot feed an attribute",
                        });
                    }
                    match streams {
                        None => streams = Some(buffer.len()),
                        Some(expected) if expected != buffer.len() => {
                            return Err(Error::AttributeLengthMismatch {
                                name: param.name.to_string(),
                                expected,
                                found: buffer.len(),
                            });
                        }
                        Some(_) => {}
                    }
                }
                ParamValue::Texture(id) => {
                    self.textures.get(id)?;
                }
                _ => {}
            }
        }

        match (indices, streams) {
            (Some(indices), _) => {
                let buffer = self.buffers.get(indices)?;
                if buffer.kind() != BufferKind::Index {
                    return Err(Error::WrongBufferKind);
                }
                Ok(DrawCall::Elements {
                    indices,
                    count: buffer.len(),
                })
            }
            (None, Some(count)) => Ok(DrawCall::Arrays { count }),
            (None, None) => Err(Error::NoDrawableBuffers),
        }
    }
}

#[expect(clippy::too_many_arguments)]
fn bind_and_draw<D: GraphicsDevice>(
    device: &D,
    program: &mut ShaderProgram<D>,
    buffers: &mut Table<BufferId, GpuBuffer<D>>,
    textures: &Table<TextureId, Texture<D>>,
    params: &[&Param],
    call: DrawCall,
    primitive: PrimitiveKind,
    debug: bool,
    bound: &mut Vec<BufferId>,
) -> Result<()> {
    device.use_program(Some(program.handle()));
    check_errors(device, debug)?;

    for param in params {
        if let ParamValue::VertexStream(id) = param.value {
            let Some(location) = program.attribute_location(device, &param.name) else {
                continue;
            };
            buffers.get_mut(id)?.bind_and_enable(device, location)?;
            bound.push(id);
            check_errors(device, debug)?;
            continue;
        }

        let Some(location) = program.uniform_location(device, &param.name) else {
            continue;
        };
        let value = match param.value {
            ParamValue::Texture(id) => UniformValue::Int(unit_index(textures.get(id)?.unit())),
            other => match other.plain_uniform() {
                Some(value) => value,
                None => continue,
            },
        };
        device.uniform(&location, value);
        check_errors(device, debug)?;
    }

    match call {
        DrawCall::Arrays { count } => {
            log::trace!("drawing {count} vertices as {primitive:?}");
            device.draw_arrays(primitive, 0, count);
        }
        DrawCall::Elements { indices, count } => {
            buffers.get(indices)?.bind_indices(device);
            check_errors(device, debug)?;
            log::trace!("drawing {count} indices as {primitive:?}");
            device.draw_elements(primitive, count);
        }
    }
    check_errors(device, debug)
}

/// Disable every bound stream and release the index buffer. Keeps going past
/// failures and reports the first one.
fn unbind<D: GraphicsDevice>(
    device: &D,
    buffers: &mut Table<BufferId, GpuBuffer<D>>,
    bound: &[BufferId],
    call: DrawCall,
    debug: bool,
) -> Result<()> {
    let mut outcome = Ok(());
    for id in bound {
        let step = buffers
            .get_mut(*id)
            .and_then(|buffer| buffer.disable(device))
            .and_then(|()| check_errors(device, debug));
        if outcome.is_ok() {
            outcome = step;
        }
    }
    if let DrawCall::Elements { .. } = call {
        GpuBuffer::unbind_indices(device);
        let step = check_errors(device, debug);
        if outcome.is_ok() {
            outcome = step;
        }
    }
    outcome
}

/// Texture units are bounded by the device's unit count.
#[expect(clippy::cast_possible_wrap)]
const fn unit_index(unit: u32) -> i32 {
    unit as i32
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;
    use crate::list::ImmutableList;
    use crate::params::MutableParameterSet;
    use crate::testing::{Command, RecordingDevice};
    use crate::types::{ElementType, TextureParams};

    const VS: &str = "attribute vec3 a_position; attribute vec2 a_uv; void main() {}";
    const FS: &str = "uniform vec4 u_color; uniform sampler2D u_texture; void main() {}";

    fn device() -> RecordingDevice {
        RecordingDevice::new()
            .with_attribute("a_position", 0)
            .with_attribute("a_uv", 1)
            .with_uniform("u_color")
            .with_uniform("u_texture")
            .with_uniform("u_matrix")
    }

    struct Scene {
        context: Context<RecordingDevice>,
        program: ProgramId,
        positions: BufferId,
        uvs: BufferId,
    }

    fn scene(device: RecordingDevice, config: ContextConfig) -> Scene {
        let mut context = Context::new(device, config);
        let program = context.create_program(VS, FS).unwrap();
        let positions = context.create_vertex_buffer(ElementType::Float, 3).unwrap();
        context
            .upload_vertices(positions, &[[0.0_f32; 3]; 4])
            .unwrap();
        let uvs = context.create_vertex_buffer(ElementType::Float, 2).unwrap();
        context.upload_vertices(uvs, &[[0.0_f32; 2]; 4]).unwrap();
        context.device().clear_commands();
        Scene {
            context,
            program,
            positions,
            uvs,
        }
    }

    fn draws(device: &RecordingDevice) -> Vec<Command> {
        device
            .commands()
            .into_iter()
            .filter(|c| matches!(c, Command::DrawArrays(..) | Command::DrawElements(..)))
            .collect()
    }

    #[test]
    fn draws_arrays_and_unbinds_streams() {
        let mut scene = scene(device(), ContextConfig::default());
        let params = [
            Param::new("a_position", scene.positions),
            Param::new("a_uv", scene.uvs),
            Param::new("u_color", [1.0_f32, 0.0, 0.0, 1.0]),
        ];
        scene
            .context
            .run_program(scene.program, &params, PrimitiveKind::TriangleFan)
            .unwrap();

        let device = scene.context.device();
        assert_eq!(
            draws(device),
            vec![Command::DrawArrays(PrimitiveKind::TriangleFan, 0, 4)]
        );
        assert!(device.enabled_attributes().is_empty());
        assert!(device.commands().contains(&Command::Uniform(
            "u_color".into(),
            UniformValue::Vec4([1.0, 0.0, 0.0, 1.0])
        )));
        assert_eq!(
            scene.context.buffer(scene.positions).unwrap().bound_location(),
            None
        );
    }

    #[test]
    fn binds_in_parameter_order() {
        let mut scene = scene(device(), ContextConfig::default());
        let params = [
            Param::new("u_color", [0.5_f32; 4]),
            Param::new("a_uv", scene.uvs),
            Param::new("a_position", scene.positions),
        ];
        scene
            .context
            .run_program(scene.program, &params, PrimitiveKind::Triangles)
            .unwrap();

        let commands = scene.context.device().commands();
        let position = |wanted: &Command| commands.iter().position(|c| c == wanted).unwrap();
        assert!(matches!(commands[0], Command::UseProgram(Some(_))));
        assert!(
            position(&Command::Uniform("u_color".into(), UniformValue::Vec4([0.5; 4])))
                < position(&Command::EnableAttribute(1))
        );
        assert!(position(&Command::EnableAttribute(1)) < position(&Command::EnableAttribute(0)));
        assert!(
            position(&Command::EnableAttribute(0))
                < position(&Command::DrawArrays(PrimitiveKind::Triangles, 0, 4))
        );
    }

    #[test]
    fn length_mismatch_is_rejected_before_any_device_call() {
        let mut scene = scene(device(), ContextConfig::default());
        scene
            .context
            .upload_vertices(scene.uvs, &[[0.0_f32; 2]; 3])
            .unwrap();
        scene.context.device().clear_commands();

        let params = [
            Param::new("a_position", scene.positions),
            Param::new("a_uv", scene.uvs),
        ];
        let err = scene
            .context
            .run_program(scene.program, &params, PrimitiveKind::Triangles)
            .unwrap_err();
        match err {
            Error::AttributeLengthMismatch {
                name,
                expected,
                found,
            } => {
                assert_eq!(name, "a_uv");
                assert_eq!((expected, found), (4, 3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(scene.context.device().commands().is_empty());
    }

    #[test]
    fn uniforms_alone_cannot_draw() {
        let mut scene = scene(device(), ContextConfig::default());
        let params = [Param::new("u_color", [1.0_f32; 4])];
        assert!(matches!(
            scene
                .context
                .run_program(scene.program, &params, PrimitiveKind::Points),
            Err(Error::NoDrawableBuffers)
        ));
        assert!(scene.context.device().commands().is_empty());
    }

    #[test]
    fn indexed_draw_uses_the_index_count() {
        let mut scene = scene(device(), ContextConfig::default());
        let indices = scene.context.create_index_buffer().unwrap();
        scene
            .context
            .upload_indices(indices, &[0, 1, 2, 2, 3, 0])
            .unwrap();
        scene.context.device().clear_commands();

        let params = [
            Param::new("a_position", scene.positions),
            Param::new("a_uv", scene.uvs),
        ];
        scene
            .context
            .run_program_indexed(scene.program, &params, indices, PrimitiveKind::Triangles)
            .unwrap();

        let device = scene.context.device();
        assert_eq!(
            draws(device),
            vec![Command::DrawElements(PrimitiveKind::Triangles, 6)]
        );
        assert_eq!(
            device.commands().last(),
            Some(&Command::BindBuffer(BufferKind::Index, None))
        );
        assert!(device.enabled_attributes().is_empty());
    }

    #[test]
    fn indexed_draw_still_checks_stream_lengths() {
        let mut scene = scene(device(), ContextConfig::default());
        scene
            .context
            .upload_vertices(scene.uvs, &[[0.0_f32; 2]; 3])
            .unwrap();
        let indices = scene.context.create_index_buffer().unwrap();
        scene.context.upload_indices(indices, &[0, 1, 2]).unwrap();
        scene.context.device().clear_commands();

        let params = [
            Param::new("a_position", scene.positions),
            Param::new("a_uv", scene.uvs),
        ];
        assert!(matches!(
            scene
                .context
                .run_program_indexed(scene.program, &params, indices, PrimitiveKind::Triangles),
            Err(Error::AttributeLengthMismatch {
                expected: 4,
                found: 3,
                ..
            })
        ));
        assert!(draws(scene.context.device()).is_empty());
        assert!(scene.context.device().commands().is_empty());
    }

    #[test]
    fn debug_draws_run_inside_the_context_vertex_array() {
        let mut scene = scene(device(), ContextConfig::debug());
        let params = [
            Param::new("a_position", scene.positions),
            Param::new("a_uv", scene.uvs),
        ];
        scene
            .context
            .run_program(scene.program, &params, PrimitiveKind::Triangles)
            .unwrap();

        let device = scene.context.device();
        assert!(device.bound_vertex_array().is_some());
        assert_eq!(draws(device).len(), 1);
    }

    #[test]
    fn indexed_draw_needs_no_streams_but_an_index_buffer() {
        let mut scene = scene(device(), ContextConfig::default());
        let indices = scene.context.create_index_buffer().unwrap();
        scene.context.upload_indices(indices, &[0, 1, 2]).unwrap();
        let params = [Param::new("u_color", [1.0_f32; 4])];

        scene
            .context
            .run_program_indexed(scene.program, &params, indices, PrimitiveKind::Triangles)
            .unwrap();
        assert!(matches!(
            scene.context.run_program_indexed(
                scene.program,
                &params,
                scene.positions,
                PrimitiveKind::Triangles
            ),
            Err(Error::WrongBufferKind)
        ));
    }

    #[test]
    fn index_buffer_as_stream_is_unsupported() {
        let mut scene = scene(device(), ContextConfig::default());
        let indices = scene.context.create_index_buffer().unwrap();
        let params = [Param::new("a_position", indices)];
        assert!(matches!(
            scene
                .context
                .run_program(scene.program, &params, PrimitiveKind::Triangles),
            Err(Error::UnsupportedParameterType { .. })
        ));
    }

    #[test]
    fn missing_names_are_skipped_but_still_sized() {
        let mut scene = scene(device(), ContextConfig::default());
        let unused = scene
            .context
            .create_vertex_buffer(ElementType::Float, 1)
            .unwrap();
        scene.context.upload_vertices(unused, &[0.0_f32; 2]).unwrap();

        let params = [
            Param::new("a_position", scene.positions),
            Param::new("u_unknown", 3_i32),
            Param::new("a_unknown", unused),
        ];
        assert!(matches!(
            scene
                .context
                .run_program(scene.program, &params, PrimitiveKind::Triangles),
            Err(Error::AttributeLengthMismatch { .. })
        ));

        scene.context.upload_vertices(unused, &[0.0_f32; 4]).unwrap();
        scene.context.device().clear_commands();
        scene
            .context
            .run_program(scene.program, &params, PrimitiveKind::Triangles)
            .unwrap();
        let commands = scene.context.device().commands();
        assert!(!commands
            .iter()
            .any(|c| matches!(c, Command::Uniform(name, _) if name == "u_unknown")));
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, Command::EnableAttribute(_)))
                .count(),
            1
        );
    }

    #[test]
    fn textures_bind_their_unit_and_matrices_upload() {
        let mut scene = scene(device(), ContextConfig::default());
        let _first = scene
            .context
            .create_texture(TextureParams::default())
            .unwrap();
        let second = scene
            .context
            .create_texture(TextureParams::default())
            .unwrap();
        scene.context.device().clear_commands();

        let identity = [
            [1.0_f32, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let params = [
            Param::new("a_position", scene.positions),
            Param::new("u_texture", second),
            Param::new("u_matrix", identity),
        ];
        scene
            .context
            .run_program(scene.program, &params, PrimitiveKind::Triangles)
            .unwrap();

        let commands = scene.context.device().commands();
        assert!(commands.contains(&Command::Uniform("u_texture".into(), UniformValue::Int(1))));
        assert!(commands.contains(&Command::Uniform(
            "u_matrix".into(),
            UniformValue::Mat4(bytemuck::cast(identity))
        )));
    }

    #[test]
    fn disposed_texture_is_rejected_up_front() {
        let mut scene = scene(device(), ContextConfig::default());
        let texture = scene
            .context
            .create_texture(TextureParams::default())
            .unwrap();
        scene.context.dispose_texture(texture).unwrap();
        scene.context.device().clear_commands();

        let params = [
            Param::new("a_position", scene.positions),
            Param::new("u_texture", texture),
        ];
        assert!(matches!(
            scene
                .context
                .run_program(scene.program, &params, PrimitiveKind::Triangles),
            Err(Error::Disposed)
        ));
        assert!(scene.context.device().commands().is_empty());
    }

    #[test]
    fn one_buffer_feeding_two_attributes_unwinds() {
        let mut scene = scene(device(), ContextConfig::default());
        let params = [
            Param::new("a_position", scene.positions),
            Param::new("a_uv", scene.positions),
        ];
        assert!(matches!(
            scene
                .context
                .run_program(scene.program, &params, PrimitiveKind::Triangles),
            Err(Error::AlreadyBound)
        ));
        let device = scene.context.device();
        assert!(draws(device).is_empty());
        assert!(device.enabled_attributes().is_empty());
        assert_eq!(
            scene.context.buffer(scene.positions).unwrap().bound_location(),
            None
        );
    }

    #[test]
    fn device_error_in_debug_mode_unwinds_streams() {
        let mut scene = scene(device().failing_draws(0x0506), ContextConfig::debug());
        let params = [
            Param::new("a_position", scene.positions),
            Param::new("a_uv", scene.uvs),
        ];
        assert!(matches!(
            scene
                .context
                .run_program(scene.program, &params, PrimitiveKind::Triangles),
            Err(Error::DeviceError { code: 0x0506 })
        ));
        assert!(scene.context.device().enabled_attributes().is_empty());

        // Streams are free again for the next draw.
        let mut quiet = scene;
        quiet.context.config.debug_checks = false;
        quiet
            .context
            .run_program(quiet.program, &params, PrimitiveKind::Triangles)
            .unwrap();
    }

    #[test]
    fn accepts_every_parameter_container() {
        let mut scene = scene(device(), ContextConfig::default());

        let base = ImmutableList::nil().cons(Param::new("a_position", scene.positions));
        let frame = base.cons(Param::new("u_color", [0.0_f32; 4]));
        scene
            .context
            .run_program(scene.program, &frame, PrimitiveKind::Triangles)
            .unwrap();

        let mut set = MutableParameterSet::new();
        set.set("a_position", scene.positions);
        set.set("u_color", [1.0_f32; 4]);
        scene
            .context
            .run_program(scene.program, &set, PrimitiveKind::Triangles)
            .unwrap();
        set.set("u_color", [0.0_f32; 4]);
        scene
            .context
            .run_program(scene.program, &set, PrimitiveKind::Triangles)
            .unwrap();

        let params = vec![Param::new("a_position", scene.positions)];
        scene
            .context
            .run_program(scene.program, &params, PrimitiveKind::Triangles)
            .unwrap();

        assert_eq!(draws(scene.context.device()).len(), 4);
        assert_eq!(base.len(), 1);
    }
}
