// crates/tf_physics/src/linear_algebra/csr.rs

//! 压缩稀疏行矩阵
//!
//! 稀疏结构由点周点连接（psup）一次性确定：每行的列为
//! 自身 + 邻居节点，升序排列。装配阶段只做带结构检查的
//! 累加，矩阵-向量乘是紧凑的行遍历。

use tf_foundation::{TfError, TfResult};

/// 压缩稀疏行方阵
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    /// 行起始偏移（长度 nrow+1）
    ia: Vec<usize>,
    /// 列编号（行内升序）
    ja: Vec<usize>,
    /// 非零值
    a: Vec<f64>,
}

impl CsrMatrix {
    /// 从点周点连接构建结构（值清零）
    ///
    /// 每行包含对角元与全部邻居；`psup[p]` 须升序且不含 p 本身。
    pub fn from_psup(psup: &[Vec<usize>]) -> Self {
        let nrow = psup.len();
        let mut ia = Vec::with_capacity(nrow + 1);
        let mut ja = Vec::new();
        ia.push(0);
        for (p, nb) in psup.iter().enumerate() {
            let mut row: Vec<usize> = nb.clone();
            row.push(p);
            row.sort_unstable();
            ja.extend_from_slice(&row);
            ia.push(ja.len());
        }
        let nnz = ja.len();
        Self {
            ia,
            ja,
            a: vec![0.0; nnz],
        }
    }

    pub fn nrow(&self) -> usize {
        self.ia.len() - 1
    }

    pub fn nnz(&self) -> usize {
        self.a.len()
    }

    /// 结构内的 (row, col) 扁平下标
    fn index(&self, row: usize, col: usize) -> TfResult<usize> {
        if row >= self.nrow() {
            return Err(TfError::IndexOutOfBounds {
                index_type: "矩阵行",
                index: row,
                len: self.nrow(),
            });
        }
        let lo = self.ia[row];
        let hi = self.ia[row + 1];
        self.ja[lo..hi]
            .binary_search(&col)
            .map(|k| lo + k)
            .map_err(|_| TfError::invalid_mesh(format!("矩阵结构中没有元素 ({row}, {col})")))
    }

    /// 装配累加 a[row][col] += v
    pub fn add(&mut self, row: usize, col: usize, v: f64) -> TfResult<()> {
        let k = self.index(row, col)?;
        self.a[k] += v;
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> TfResult<f64> {
        Ok(self.a[self.index(row, col)?])
    }

    /// 全部非零清零（结构保留）
    pub fn zero(&mut self) {
        self.a.fill(0.0);
    }

    /// r = A·x
    pub fn mult(&self, x: &[f64], r: &mut [f64]) -> TfResult<()> {
        if x.len() != self.nrow() || r.len() != self.nrow() {
            return Err(TfError::SizeMismatch {
                name: "矩阵-向量乘",
                expected: self.nrow(),
                actual: x.len().min(r.len()),
            });
        }
        for row in 0..self.nrow() {
            let mut acc = 0.0;
            for k in self.ia[row]..self.ia[row + 1] {
                acc += self.a[k] * x[self.ja[k]];
            }
            r[row] = acc;
        }
        Ok(())
    }

    /// Dirichlet 行: 整行清零、对角置一
    ///
    /// 对应的右端项须由调用方同时改写为边界值。
    pub fn dirichlet_row(&mut self, row: usize) -> TfResult<()> {
        if row >= self.nrow() {
            return Err(TfError::IndexOutOfBounds {
                index_type: "矩阵行",
                index: row,
                len: self.nrow(),
            });
        }
        for k in self.ia[row]..self.ia[row + 1] {
            self.a[k] = if self.ja[k] == row { 1.0 } else { 0.0 };
        }
        Ok(())
    }
}
