use nalgebra::{Point3, Unit, Vector2, Vector3, Vector4};
use rand::Rng;

use crate::firefly::hit::{trace_ray, HitPayload};
use crate::firefly::ray::Ray;
use crate::firefly::scene::Scene;
use crate::util::random_in_unit_sphere;

pub const BOUNCE_LIMIT: usize = 5;

/// 아무것도 맞지 않은 광선이 가져오는 하늘 색
pub const SKY_COLOR: Vector3<f32> = Vector3::new(0.6, 0.7, 0.9);

/// 다음 광선을 표면에서 띄우는 거리
pub const SURFACE_OFFSET: f32 = 0.0001;

pub const CAMERA_POSITION: Point3<f32> = Point3::new(0.0, 0.0, 1.0);

/// 난반사 방향을 만들 때 쓰는 무작위 벡터 공급원.
///
/// 반환값은 단위 구 내부(또는 경계)에 있어야 하고 특정 반구로 치우치면 안 됨.
pub trait RandomSource {
    fn unit_sphere_vector(&mut self) -> Vector3<f32>;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn unit_sphere_vector(&mut self) -> Vector3<f32> {
        random_in_unit_sphere(self)
    }
}

/// 고정된 카메라에서 픽셀 (x, y)로 나가는 첫 광선
pub fn primary_ray(x: u32, y: u32, width: u32, height: u32) -> Ray {
    let coord = Vector2::new(x as f32 / width as f32, y as f32 / height as f32) * 2.0
        - Vector2::new(1.0, 1.0);

    Ray::new(CAMERA_POSITION, Vector3::new(coord.x, coord.y, -1.0))
}

// DirectX의 RayGen 쉐이더와 같음
pub fn per_pixel<R: RandomSource + ?Sized>(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    scene: &Scene,
    random: &mut R,
) -> Vector4<f32> {
    let mut ray = primary_ray(x, y, width, height);

    let mut light = Vector3::zeros();
    let mut throughput = Vector3::new(1.0, 1.0, 1.0);

    for _ in 0..BOUNCE_LIMIT {
        let Some(HitPayload { position, normal, object_index, .. }) = trace_ray(&ray, scene) else {
            light += SKY_COLOR.component_mul(&throughput);
            break;
        };

        let material = &scene.spheres[object_index].material;

        // 흡수만 함. 튕길 때마다 에너지는 줄어들기만 함
        throughput.component_mul_assign(&material.albedo);
        light += material.emission();

        // position 자체가 구에 접하기 때문에 position을 다음 레이 트레이싱에 바로 사용하면 제대로 안할 것임.
        // 그래서 조금이라도 옮겨야 함
        ray.origin = position + normal.into_inner() * SURFACE_OFFSET;
        ray.direction = scatter_direction(&normal, random.unit_sphere_vector());
    }

    Vector4::new(light.x, light.y, light.z, 1.0)
}

fn scatter_direction(normal: &Unit<Vector3<f32>>, offset: Vector3<f32>) -> Unit<Vector3<f32>> {
    // 무작위 벡터가 법선과 정확히 반대면 길이가 0이 됨
    Unit::try_new(normal.into_inner() + offset, 1.0e-6).unwrap_or(*normal)
}
