//! WGSL source for the lattice kernels.
//!
//! Every kernel shares one bind group:
//! 0 = parameters, 1 = current lattice, 2 = next lattice, 3 = obstacle.
//! The direction tables are generated from the host constants so both
//! sides iterate the same directions in the same order.

use crate::d2q9::{C, Q, Q_BAR, W};

/// Cells per collide workgroup; each stages its 9 values in workgroup memory.
pub const COLLIDE_WORKGROUP_SIZE: u32 = 32;

/// Side of the square workgroups used by the per-(row, column) kernels.
pub const GRID_WORKGROUP_SIZE: u32 = 16;

const KERNELS: &str = r#"
struct Params {
    height: u32,
    width: u32,
    omega: f32,
    density_floor: f32,
    inflow_x: f32,
    inflow_y: f32,
    inflow_density: f32,
    _padding: u32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read_write> current: array<f32>;
@group(0) @binding(2) var<storage, read_write> next: array<f32>;
@group(0) @binding(3) var<storage, read> obstacle: array<u32>;

var<workgroup> tile: array<f32, 288>;

fn equilibrium(q: u32, rho: f32, ux: f32, uy: f32) -> f32 {
    let u_dot_c = f32(CX[q]) * ux + f32(CY[q]) * uy;
    let u_2 = ux * ux + uy * uy;
    return W[q] * rho * (1.0 + 3.0 * u_dot_c + 4.5 * u_dot_c * u_dot_c - 1.5 * u_2);
}

fn is_edge(x: u32, y: u32) -> bool {
    return x == 0u || y == 0u || x == params.width - 1u || y == params.height - 1u;
}

@compute @workgroup_size(16, 16)
fn set_boundaries(@builtin(global_invocation_id) gid: vec3<u32>) {
    let x = gid.x;
    let y = gid.y;
    if (x >= params.width || y >= params.height || !is_edge(x, y)) {
        return;
    }
    let base = (x + y * params.width) * Q;
    for (var q = 0u; q < Q; q = q + 1u) {
        current[base + q] = equilibrium(q, params.inflow_density, params.inflow_x, params.inflow_y);
    }
}

@compute @workgroup_size(32)
fn collide(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(local_invocation_index) lane: u32,
) {
    let cell = gid.x;
    if (cell >= params.width * params.height) {
        return;
    }
    let base = cell * Q;
    let slot = lane * Q;

    var rho: f32 = 0.0;
    for (var q = 0u; q < Q; q = q + 1u) {
        tile[slot + q] = current[base + q];
        rho = rho + tile[slot + q];
    }
    var mx: f32 = 0.0;
    var my: f32 = 0.0;
    for (var q = 0u; q < Q; q = q + 1u) {
        mx = mx + f32(CX[q]) * tile[slot + q];
        my = my + f32(CY[q]) * tile[slot + q];
    }
    let safe_rho = max(rho, params.density_floor);
    let ux = mx / safe_rho;
    let uy = my / safe_rho;

    for (var q = 0u; q < Q; q = q + 1u) {
        let f = tile[slot + q];
        current[base + q] = max(f + params.omega * (equilibrium(q, rho, ux, uy) - f), 0.0);
    }
}

@compute @workgroup_size(16, 16)
fn stream(@builtin(global_invocation_id) gid: vec3<u32>) {
    let x = gid.x;
    let y = gid.y;
    if (x >= params.width || y >= params.height) {
        return;
    }
    let base = (x + y * params.width) * Q;
    if (is_edge(x, y)) {
        for (var q = 0u; q < Q; q = q + 1u) {
            next[base + q] = current[base + q];
        }
        return;
    }
    for (var q = 0u; q < Q; q = q + 1u) {
        let source_x = u32(i32(x) - CX[q]);
        let source_y = u32(i32(y) - CY[q]);
        next[base + q] = current[(source_x + source_y * params.width) * Q + q];
    }
}

@compute @workgroup_size(16, 16)
fn bounce_back(@builtin(global_invocation_id) gid: vec3<u32>) {
    let x = gid.x;
    let y = gid.y;
    if (x >= params.width || y >= params.height) {
        return;
    }
    let cell = x + y * params.width;
    if (obstacle[cell] == 0u) {
        return;
    }
    let base = cell * Q;
    for (var q = 1u; q < Q; q = q + 1u) {
        let mirror_x = i32(x) - CX[q];
        let mirror_y = i32(y) - CY[q];
        let inside = mirror_x >= 0 && mirror_y >= 0
            && mirror_x < i32(params.width) && mirror_y < i32(params.height);
        if (inside) {
            let mirror = u32(mirror_x) + u32(mirror_y) * params.width;
            if (obstacle[mirror] == 0u) {
                next[mirror * Q + Q_BAR[q]] = next[base + q];
            }
        }
        next[base + q] = 0.0;
    }
}
"#;

fn list<T: std::fmt::Display>(values: impl IntoIterator<Item = T>, suffix: &str) -> String {
    values
        .into_iter()
        .map(|value| format!("{value}{suffix}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Complete module: generated tables followed by the four kernels.
pub fn lattice_source() -> String {
    let weights = W.iter().map(|w| format!("{w:?}")).collect::<Vec<_>>().join(", ");
    format!(
        "const Q: u32 = {Q}u;\n\
         var<private> CX: array<i32, {Q}> = array<i32, {Q}>({cx});\n\
         var<private> CY: array<i32, {Q}> = array<i32, {Q}>({cy});\n\
         var<private> W: array<f32, {Q}> = array<f32, {Q}>({weights});\n\
         var<private> Q_BAR: array<u32, {Q}> = array<u32, {Q}>({q_bar});\n\
         {KERNELS}",
        cx = list(C.iter().map(|c| c[0]), ""),
        cy = list(C.iter().map(|c| c[1]), ""),
        q_bar = list(Q_BAR, "u"),
    )
}
