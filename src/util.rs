use std::ops::Range;

use nalgebra::{Vector3, Vector4};
use rand::Rng;

pub fn random_vec<R: Rng + ?Sized>(rng: &mut R, range: Range<f32>) -> Vector3<f32> {
    Vector3::new(
        rng.gen_range(range.clone()),
        rng.gen_range(range.clone()),
        rng.gen_range(range),
    )
}

/// 단위 구 내부(경계 포함)의 무작위 벡터. 정육면체에서 뽑고 구 밖이면 다시 뽑음.
pub fn random_in_unit_sphere<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f32> {
    loop {
        let candidate = random_vec(rng, -1.0..1.0);
        if candidate.magnitude_squared() <= 1.0 {
            return candidate;
        }
    }
}

/// [0, 1] 범위의 색상을 0xAABBGGRR로 변환. 반올림이 아니라 버림.
pub fn vec4_to_rgba(color: &Vector4<f32>) -> u32 {
    let r = (color.x * 255.0) as u8 as u32;
    let g = (color.y * 255.0) as u8 as u32;
    let b = (color.z * 255.0) as u8 as u32;
    let a = (color.w * 255.0) as u8 as u32;

    (a << 24) | (b << 16) | (g << 8) | r
}
