//! Ready-made draws built on [`Context::run_program`].

use crate::context::Context;
use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::list::ImmutableList;
use crate::params::Param;
use crate::registry::{BufferId, ProgramId, ResourceKey, TextureId};
use crate::types::{ElementType, PrimitiveKind};

/// Vertex shader for [`TextureRenderer`].
///
/// # Uniforms
///
/// | Name           | Type   | Description                         |
/// |----------------|--------|-------------------------------------|
/// | `u_mvp_matrix` | `mat4` | Model-view-projection, column-major |
pub const TEXTURE_VERTEX_SRC: &str = r"#version 140

in vec3 a_position;
in vec2 a_tex_coord;

uniform mat4 u_mvp_matrix;

out vec2 v_tex_coord;

void main() {
    v_tex_coord = a_tex_coord;
    gl_Position = u_mvp_matrix * vec4(a_position, 1.0);
}
";

/// Fragment shader for [`TextureRenderer`]: samples `u_texture`.
pub const TEXTURE_FRAGMENT_SRC: &str = r"#version 140

uniform sampler2D u_texture;

in vec2 v_tex_coord;

out vec4 frag_color;

void main() {
    frag_color = texture(u_texture, v_tex_coord);
}
";

// Triangle strip order.
const QUAD_POSITIONS: [[f32; 3]; 4] = [
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
];
const QUAD_TEX_COORDS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

/// Draws a texture onto the quad spanning `[-1, 1]` in x and y.
///
/// The quad's streams and the texture sit in a parameter list built once.
/// Each [`render`](Self::render) prepends the matrix to it, so the shared
/// list is never copied or modified.
#[derive(Debug)]
pub struct TextureRenderer {
    program: ProgramId,
    positions: BufferId,
    tex_coords: BufferId,
    texture: TextureId,
    params: ImmutableList<Param>,
}

impl TextureRenderer {
    /// Compile the program and upload the quad. The texture stays owned by
    /// the caller.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`](crate::Error::Disposed) or
    /// [`Error::UnknownResource`](crate::Error::UnknownResource) for a bad
    /// texture id, otherwise whatever creating the program or the buffers
    /// reports. Nothing created so far is left behind.
    pub fn new<D: GraphicsDevice>(context: &mut Context<D>, texture: TextureId) -> Result<Self> {
        context.texture(texture)?;
        let program = context.create_program(TEXTURE_VERTEX_SRC, TEXTURE_FRAGMENT_SRC)?;
        let (positions, tex_coords) =
            upload_quad(context).inspect_err(|_| context.discard(program))?;

        let params = [
            Param::new("a_position", positions),
            Param::new("a_tex_coord", tex_coords),
            Param::new("u_texture", texture),
        ]
        .into_iter()
        .collect();
        Ok(Self {
            program,
            positions,
            tex_coords,
            texture,
            params,
        })
    }

    /// Draw the quad transformed by the column-major `mvp_matrix`.
    ///
    /// # Errors
    ///
    /// As [`Context::run_program`].
    pub fn render<D: GraphicsDevice>(
        &self,
        context: &mut Context<D>,
        mvp_matrix: [[f32; 4]; 4],
    ) -> Result<()> {
        let params = self.params.cons(Param::new("u_mvp_matrix", mvp_matrix));
        context.run_program(self.program, &params, PrimitiveKind::TriangleStrip)
    }

    /// The texture being drawn.
    #[must_use]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Parameters shared by every render.
    #[must_use]
    pub fn params(&self) -> &ImmutableList<Param> {
        &self.params
    }

    /// Dispose the program and both quad buffers, but not the texture.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownResource`](crate::Error::UnknownResource) when
    /// `context` is not the one the renderer was created in.
    pub fn dispose<D: GraphicsDevice>(self, context: &mut Context<D>) -> Result<()> {
        let keys: [ResourceKey; 3] = [
            self.tex_coords.into(),
            self.positions.into(),
            self.program.into(),
        ];
        for key in keys {
            context.dispose_resource(key)?;
        }
        Ok(())
    }
}

fn upload_quad<D: GraphicsDevice>(context: &mut Context<D>) -> Result<(BufferId, BufferId)> {
    let positions = context.create_vertex_buffer(ElementType::Float, 3)?;
    let tex_coords = context
        .create_vertex_buffer(ElementType::Float, 2)
        .inspect_err(|_| context.discard(positions))?;

    let uploaded = context
        .upload_vertices(positions, &QUAD_POSITIONS)
        .and_then(|()| context.upload_vertices(tex_coords, &QUAD_TEX_COORDS));
    if let Err(e) = uploaded {
        context.discard(tex_coords);
        context.discard(positions);
        return Err(e);
    }
    Ok((positions, tex_coords))
}
