use nalgebra::{Point3, Unit, Vector3};

pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Unit<Vector3<f32>>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: Unit::new_normalize(direction),
        }
    }
}
