use nalgebra::{Point3, Unit, Vector3};

use crate::firefly::ray::Ray;
use crate::firefly::scene::{Scene, Sphere};

// Cherno씨와 같은 디자인 선택, HitPayload는 빛의 경로에 대한 정보만 담고
// 이를 이용해 색상을 알아내는건 나중에 함
#[derive(Debug, Clone, Copy)]
pub struct HitPayload {
    pub distance: f32,
    pub position: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
    pub object_index: usize,
}

/// 광선이 처음 만나는 구를 찾음. 아무것도 안 맞으면 `None` (Miss).
pub fn trace_ray(ray: &Ray, scene: &Scene) -> Option<HitPayload> {
    let direction = ray.direction.into_inner();
    let mut closest: Option<(usize, f32)> = None;

    for (index, sphere) in scene.spheres.iter().enumerate() {
        // a = 빔 시작
        // b = 빔 방향
        // r = 구 반지름
        // (bx^2 + by^2 + bz^2) * t^2 + 2 * (ax * bx + ay * by + az * bz) * t + (ax^2 + ay^2 + az^2 - r^2) = 0
        // 구가 원점에 있다고 가정한 식. 구 대신 빔 시작점을 그만큼 옮겨서 해결함.
        let origin = ray.origin - sphere.position;

        let first = direction.magnitude_squared();
        let second = 2.0 * origin.coords.dot(&direction);
        let third = origin.coords.magnitude_squared() - sphere.radius.powi(2);

        // 판별식
        let discriminant = second.powi(2) - 4.0 * first * third;
        if discriminant < 0.0 {
            continue;
        }

        // 가까운 근만 필요함. 먼 근은 구를 빠져나가는 지점.
        let distance = (-second - discriminant.sqrt()) / (2.0 * first);

        // 빔 뒤쪽 교차 무시. NaN도 여기서 걸러짐
        if !(distance > 0.0) {
            continue;
        }

        match closest {
            Some((_, previous_distance)) if previous_distance <= distance => {}
            _ => closest = Some((index, distance)),
        }
    }

    closest.map(|(index, distance)| closest_hit(ray, distance, index, &scene.spheres[index]))
}

fn closest_hit(ray: &Ray, distance: f32, object_index: usize, sphere: &Sphere) -> HitPayload {
    let fake_origin = ray.origin - sphere.position;
    let fake_position = fake_origin + ray.direction.into_inner() * distance;

    // 구 중심에서 교차점으로 향하는 벡터는 언제나 바깥쪽
    let normal = Unit::new_normalize(fake_position.coords);
    let position = fake_position + sphere.position;

    HitPayload {
        distance,
        position,
        normal,
        object_index,
    }
}
