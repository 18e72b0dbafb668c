// crates/tf_physics/src/pde/mod.rs

//! 方程体系
//!
//! 三个方程体系共用一个封闭枚举做静态分发：
//! - [`Transport`]: 标量输运, 点格式（两阶段）
//! - [`CompFlow`]: 单材料可压缩流, 点格式（两阶段或边格式）
//! - [`MultiMat`]: 多材料可压缩流, 单元格式（P0/P1）
//!
//! 推进器按变体选择装配路径; 枚举只暴露所有体系共有的
//! 分量数/初始化/时间步长三个操作。

pub mod compflow;
pub mod multimat;
pub mod transport;

pub use compflow::CompFlow;
pub use multimat::MultiMat;
pub use transport::Transport;

use tf_foundation::TfResult;
use tf_mesh::TetMesh;

use crate::fields::Fields;

/// 方程体系（封闭集合, 不走 trait 对象）
pub enum PdeSystem {
    Transport(Transport),
    CompFlow(CompFlow),
    MultiMat(MultiMat),
}

impl PdeSystem {
    /// 守恒分量数
    pub fn ncomp(&self) -> usize {
        match self {
            PdeSystem::Transport(t) => t.ncomp(),
            PdeSystem::CompFlow(c) => c.ncomp(),
            PdeSystem::MultiMat(m) => m.ncomp(),
        }
    }

    /// 未知量是节点值（点格式）还是单元自由度（单元格式）
    pub fn is_nodal(&self) -> bool {
        !matches!(self, PdeSystem::MultiMat(_))
    }

    /// 每个未知量的属性数（单元格式为 ncomp·ndof）
    pub fn nprop(&self) -> usize {
        match self {
            PdeSystem::MultiMat(m) => m.ncomp() * m.ndof(),
            other => other.ncomp(),
        }
    }

    /// 初始条件
    pub fn initialize(&self, mesh: &TetMesh, t: f64, u: &mut Fields) -> TfResult<()> {
        match self {
            PdeSystem::Transport(tr) => {
                tr.initialize(mesh, t, u);
                Ok(())
            }
            PdeSystem::CompFlow(c) => {
                c.initialize(mesh, t, u);
                Ok(())
            }
            PdeSystem::MultiMat(m) => m.initialize(mesh, t, u),
        }
    }

    /// 本分区的 CFL 时间步长（跨分区取最小由推进器归约）
    pub fn dt(&self, mesh: &TetMesh, t: f64, u: &Fields, cfl: f64) -> TfResult<f64> {
        match self {
            PdeSystem::Transport(tr) => tr.dt(mesh, t, cfl),
            PdeSystem::CompFlow(c) => c.dt(mesh, u, cfl),
            PdeSystem::MultiMat(m) => m.dt(mesh, u, cfl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eos::Material;
    use crate::problems::{GaussianHump, MultiMatSod, SodShocktube};
    use crate::types::{FluxKind, PrelaxMode};
    use glam::DVec3;

    #[test]
    fn test_dispatch_ncomp_and_layout() {
        let tr = PdeSystem::Transport(Transport::new(Box::new(GaussianHump {
            center: DVec3::splat(0.5),
            width: 0.1,
            velocity: DVec3::X,
        })));
        let cf = PdeSystem::CompFlow(CompFlow::new(
            Material::ideal_gas(1.4),
            Box::new(SodShocktube),
            None,
        ));
        let mm = PdeSystem::MultiMat(MultiMat::new(
            vec![Material::ideal_gas(1.4), Material::ideal_gas(1.4)],
            Box::new(MultiMatSod),
            FluxKind::Ausm,
            PrelaxMode::Off,
            4,
        ));
        assert_eq!(tr.ncomp(), 1);
        assert_eq!(cf.ncomp(), 5);
        assert_eq!(mm.ncomp(), 9);
        assert!(tr.is_nodal());
        assert!(cf.is_nodal());
        assert!(!mm.is_nodal());
        assert_eq!(mm.nprop(), 36);
        assert_eq!(cf.nprop(), 5);
    }

    #[test]
    fn test_dispatch_initialize_and_dt() {
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        let cf = PdeSystem::CompFlow(CompFlow::new(
            Material::ideal_gas(1.4),
            Box::new(SodShocktube),
            None,
        ));
        let mut u = Fields::new(mesh.nnode(), cf.nprop());
        cf.initialize(&mesh, 0.0, &mut u).unwrap();
        let dt = cf.dt(&mesh, 0.0, &u, 0.5).unwrap();
        assert!(dt > 0.0);
    }
}
