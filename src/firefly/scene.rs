use nalgebra::Vector3;

#[derive(Default, Clone)]
pub struct Scene {
    pub spheres: Vec<Sphere>,
}

#[derive(Clone)]
pub struct Sphere {
    pub position: Vector3<f32>,
    pub radius: f32,
    pub material: Material,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            radius: 0.5,
            material: Material::default(),
        }
    }
}

#[derive(Clone)]
pub struct Material {
    pub albedo: Vector3<f32>,
    // 셰이딩에서 아직 읽지 않음
    pub roughness: f32,
    pub metallic: f32,

    pub emission_color: Vector3<f32>,
    pub emission_power: f32,
}

impl Material {
    pub fn emission(&self) -> Vector3<f32> {
        self.emission_color * self.emission_power
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vector3::new(1.0, 1.0, 1.0),
            roughness: 1.0,
            metallic: 0.0,
            emission_color: Vector3::zeros(),
            emission_power: 0.0,
        }
    }
}
