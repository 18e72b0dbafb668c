// crates/tf_physics/src/fct.rs

//! 通量校正输运 (FEM-FCT)
//!
//! 点格式的高阶解（一致质量阵）无界，低阶解（集中质量阵 +
//! 质量扩散）单调。FCT 把两者的差按单元拆成反扩散贡献 AEC，
//! 再按 Zalesak 比例限制后叠加回低阶解：
//!
//! 1. `mass_diffusion`: 低阶右端项附加 D = -c_τ·(M_c - M_L)·uⁿ
//! 2. `aec`: AEC(e,a) = Σ_b m_ab·(Δu^H_b + c_τ·uⁿ_b) / m_L(a)，
//!    m = M_L - M_c（对角 3J/120, 非对角 -J/120）;
//!    恒等式 Σ_e AEC(e,a) = Δu^H_a - Δu^L_a
//! 3. `allowed_bounds`: 节点周围单元上 max/min(uⁿ, u^L) 的包络
//! 4. `sums`: 每节点正/负反扩散总量 P±
//! 5. `limit`: 比例 R± = min(1, Q±/P±)，单元系数取四节点最小，
//!    系统分量（如可压缩流的整组守恒量）再取组内最小
//!
//! 分区并行时 D、AEC 节点和、P±、包络各需一轮归并
//! （Add/Add/Add/Min/Max），由推进器驱动。

use tf_foundation::{TfError, TfResult};
use tf_mesh::TetMesh;

use crate::fields::Fields;

/// 单元 (集中 - 一致) 质量阵, 按 J 缩放
#[inline]
fn element_mass(jacobian: f64) -> [[f64; 4]; 4] {
    let diag = 3.0 * jacobian / 120.0;
    let off = -jacobian / 120.0;
    let mut m = [[off; 4]; 4];
    for a in 0..4 {
        m[a][a] = diag;
    }
    m
}

/// FCT 限制器状态
pub struct FluxCorrector {
    ncomp: usize,
    ctau: f64,
    /// 作为一个系统限制的分量组（整组取同一单元系数）
    sys: Option<Vec<usize>>,
}

impl FluxCorrector {
    pub fn new(ncomp: usize, ctau: f64) -> Self {
        Self {
            ncomp,
            ctau,
            sys: None,
        }
    }

    /// 把一组分量按同一系数限制（可压缩流的 [ρ, ρv, ρE] 整组）
    pub fn with_system(mut self, comps: Vec<usize>) -> Self {
        self.sys = Some(comps);
        self
    }

    /// 集中质量阵（每节点 Σ J/24, 即节点控制体积）
    pub fn lumped_mass(mesh: &TetMesh) -> TfResult<Vec<f64>> {
        let mut ml = vec![0.0; mesh.nnode()];
        for e in 0..mesh.nelem() {
            let geo = mesh.element_geometry(e)?;
            for &n in &mesh.inpoel[e] {
                ml[n] += geo.jacobian / 24.0;
            }
        }
        Ok(ml)
    }

    /// 低阶系统的质量扩散右端项 D -= c_τ·m·uⁿ（散布到节点）
    pub fn mass_diffusion(&self, mesh: &TetMesh, un: &Fields, d: &mut Fields) -> TfResult<()> {
        self.check(mesh, un, "质量扩散输入")?;
        for e in 0..mesh.nelem() {
            let geo = mesh.element_geometry(e)?;
            let m = element_mass(geo.jacobian);
            let nodes = mesh.inpoel[e];
            for a in 0..4 {
                for c in 0..self.ncomp {
                    let mut acc = 0.0;
                    for b in 0..4 {
                        acc += m[a][b] * un.get(nodes[b], c);
                    }
                    d.add(nodes[a], c, -self.ctau * acc);
                }
            }
        }
        Ok(())
    }

    /// 反扩散单元贡献
    ///
    /// `aec` 的行布局为 e·4+a（单元 e 的局部节点 a）。
    /// `dirichlet` 标记的节点贡献清零（该处解由边界条件决定）。
    pub fn aec(
        &self,
        mesh: &TetMesh,
        ml: &[f64],
        un: &Fields,
        duh: &Fields,
        dirichlet: &[bool],
        aec: &mut Fields,
    ) -> TfResult<()> {
        self.check(mesh, un, "反扩散输入")?;
        if aec.nunk() != 4 * mesh.nelem() {
            return Err(TfError::SizeMismatch {
                name: "反扩散贡献",
                expected: 4 * mesh.nelem(),
                actual: aec.nunk(),
            });
        }
        aec.fill_zero();
        for e in 0..mesh.nelem() {
            let geo = mesh.element_geometry(e)?;
            let m = element_mass(geo.jacobian);
            let nodes = mesh.inpoel[e];
            for a in 0..4 {
                if dirichlet[nodes[a]] {
                    continue;
                }
                for c in 0..self.ncomp {
                    let mut acc = 0.0;
                    for b in 0..4 {
                        acc += m[a][b] * (duh.get(nodes[b], c) + self.ctau * un.get(nodes[b], c));
                    }
                    aec.set(e * 4 + a, c, acc / ml[nodes[a]]);
                }
            }
        }
        Ok(())
    }

    /// 节点允许范围: 周围单元上 max/min(uⁿ, u^L) 的包络
    ///
    /// 分区边界节点的包络是部分的，合并规则为 qmin 取 Min、qmax 取 Max。
    pub fn allowed_bounds(
        &self,
        mesh: &TetMesh,
        un: &Fields,
        ul: &Fields,
        qmin: &mut Fields,
        qmax: &mut Fields,
    ) {
        for p in 0..mesh.nnode() {
            for c in 0..self.ncomp {
                qmin.set(p, c, f64::MAX);
                qmax.set(p, c, f64::MIN);
            }
        }
        for e in 0..mesh.nelem() {
            let nodes = mesh.inpoel[e];
            for c in 0..self.ncomp {
                let mut lo = f64::MAX;
                let mut hi = f64::MIN;
                for &b in &nodes {
                    lo = lo.min(un.get(b, c)).min(ul.get(b, c));
                    hi = hi.max(un.get(b, c)).max(ul.get(b, c));
                }
                for &a in &nodes {
                    if lo < qmin.get(a, c) {
                        qmin.set(a, c, lo);
                    }
                    if hi > qmax.get(a, c) {
                        qmax.set(a, c, hi);
                    }
                }
            }
        }
    }

    /// 每节点正/负反扩散总量 P±（分区间按 Add 合并）
    ///
    /// `p` 的属性布局: 分量 c 的正部在 2c、负部在 2c+1。
    pub fn sums(&self, mesh: &TetMesh, aec: &Fields, p: &mut Fields) {
        p.fill_zero();
        for e in 0..mesh.nelem() {
            let nodes = mesh.inpoel[e];
            for a in 0..4 {
                for c in 0..self.ncomp {
                    let v = aec.get(e * 4 + a, c);
                    if v > 0.0 {
                        p.add(nodes[a], 2 * c, v);
                    } else {
                        p.add(nodes[a], 2 * c + 1, v);
                    }
                }
            }
        }
    }

    /// 限制并散布: out += Σ_e C_e·AEC(e,a)
    ///
    /// C_e 为单元四节点比例的最小值; 系统分量组内再取最小,
    /// 保证整组守恒量按同一比例校正（避免组内失配产生负压）。
    pub fn limit(
        &self,
        mesh: &TetMesh,
        aec: &Fields,
        ul: &Fields,
        p: &Fields,
        qmin: &Fields,
        qmax: &Fields,
        out: &mut Fields,
    ) {
        let ratio = |node: usize, c: usize, positive: bool| -> f64 {
            let (ps, q) = if positive {
                (p.get(node, 2 * c), qmax.get(node, c) - ul.get(node, c))
            } else {
                (p.get(node, 2 * c + 1), qmin.get(node, c) - ul.get(node, c))
            };
            if ps.abs() < f64::EPSILON {
                1.0
            } else {
                (q / ps).clamp(0.0, 1.0)
            }
        };

        for e in 0..mesh.nelem() {
            let nodes = mesh.inpoel[e];
            let mut coef = vec![1.0f64; self.ncomp];
            for c in 0..self.ncomp {
                for a in 0..4 {
                    let v = aec.get(e * 4 + a, c);
                    coef[c] = coef[c].min(ratio(nodes[a], c, v > 0.0));
                }
            }
            // 系统分量组内统一系数
            if let Some(sys) = &self.sys {
                let cmin = sys
                    .iter()
                    .map(|&c| coef[c])
                    .fold(f64::MAX, f64::min);
                for &c in sys {
                    coef[c] = cmin;
                }
            }
            for a in 0..4 {
                for c in 0..self.ncomp {
                    out.add(nodes[a], c, coef[c] * aec.get(e * 4 + a, c));
                }
            }
        }
    }

    /// 串行一步到位: 返回限制后的增量 Δu = Δu^L + Σ C·AEC
    ///
    /// 分区并行时不要用这个入口，各归并点需要插入通信。
    pub fn apply_serial(
        &self,
        mesh: &TetMesh,
        ml: &[f64],
        un: &Fields,
        duh: &Fields,
        dul: &Fields,
        dirichlet: &[bool],
    ) -> TfResult<Fields> {
        let mut aec = Fields::new(4 * mesh.nelem(), self.ncomp);
        self.aec(mesh, ml, un, duh, dirichlet, &mut aec)?;

        // 低阶解 u^L = uⁿ + Δu^L
        let mut ul = un.clone();
        ul.axpy(1.0, dul)?;

        let mut qmin = Fields::new(mesh.nnode(), self.ncomp);
        let mut qmax = Fields::new(mesh.nnode(), self.ncomp);
        self.allowed_bounds(mesh, un, &ul, &mut qmin, &mut qmax);

        let mut p = Fields::new(mesh.nnode(), 2 * self.ncomp);
        self.sums(mesh, &aec, &mut p);

        let mut out = dul.clone();
        self.limit(mesh, &aec, &ul, &p, &qmin, &qmax, &mut out);
        Ok(out)
    }

    fn check(&self, mesh: &TetMesh, u: &Fields, name: &'static str) -> TfResult<()> {
        if u.nunk() != mesh.nnode() {
            return Err(TfError::SizeMismatch {
                name,
                expected: mesh.nnode(),
                actual: u.nunk(),
            });
        }
        Ok(())
    }
}
