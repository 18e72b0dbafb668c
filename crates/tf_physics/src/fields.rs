// crates/tf_physics/src/fields.rs

//! 未知量场
//!
//! `Fields` 是按 (未知量, 分量) 索引的稠密二维数组：
//! 点为中心的格式行数为节点数，单元为中心的格式行数为单元数；
//! 高阶单元格式的列数为 分量数 × 每分量自由度数。
//! 行内连续存储，便于按未知量整行读写。

use serde::{Deserialize, Serialize};
use tf_foundation::{TfError, TfResult};

/// 稠密未知量数组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fields {
    nunk: usize,
    nprop: usize,
    data: Vec<f64>,
}

impl Fields {
    /// 全零初始化
    pub fn new(nunk: usize, nprop: usize) -> Self {
        Self {
            nunk,
            nprop,
            data: vec![0.0; nunk * nprop],
        }
    }

    /// 未知量个数（行数）
    #[inline]
    pub fn nunk(&self) -> usize {
        self.nunk
    }

    /// 每个未知量的分量数（列数）
    #[inline]
    pub fn nprop(&self) -> usize {
        self.nprop
    }

    #[inline]
    pub fn get(&self, unk: usize, prop: usize) -> f64 {
        self.data[unk * self.nprop + prop]
    }

    #[inline]
    pub fn set(&mut self, unk: usize, prop: usize, value: f64) {
        self.data[unk * self.nprop + prop] = value;
    }

    #[inline]
    pub fn add(&mut self, unk: usize, prop: usize, value: f64) {
        self.data[unk * self.nprop + prop] += value;
    }

    /// 一个未知量的全部分量
    #[inline]
    pub fn row(&self, unk: usize) -> &[f64] {
        &self.data[unk * self.nprop..(unk + 1) * self.nprop]
    }

    #[inline]
    pub fn row_mut(&mut self, unk: usize) -> &mut [f64] {
        &mut self.data[unk * self.nprop..(unk + 1) * self.nprop]
    }

    /// 全部置零
    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// 逐元素 self += s * other
    pub fn axpy(&mut self, s: f64, other: &Fields) -> TfResult<()> {
        if self.nunk != other.nunk || self.nprop != other.nprop {
            return Err(TfError::SizeMismatch {
                name: "场尺寸",
                expected: self.data.len(),
                actual: other.data.len(),
            });
        }
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a += s * b;
        }
        Ok(())
    }

    /// 底层数据（诊断/序列化用）
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_layout() {
        let mut f = Fields::new(3, 2);
        f.set(1, 0, 4.0);
        f.set(1, 1, 5.0);
        assert_eq!(f.row(1), &[4.0, 5.0]);
        assert_eq!(f.get(0, 0), 0.0);
    }

    #[test]
    fn test_axpy() {
        let mut a = Fields::new(2, 2);
        let mut b = Fields::new(2, 2);
        a.set(0, 0, 1.0);
        b.set(0, 0, 2.0);
        b.set(1, 1, -1.0);
        a.axpy(0.5, &b).unwrap();
        assert_eq!(a.get(0, 0), 2.0);
        assert_eq!(a.get(1, 1), -0.5);

        let c = Fields::new(3, 2);
        assert!(a.axpy(1.0, &c).is_err());
    }
}
