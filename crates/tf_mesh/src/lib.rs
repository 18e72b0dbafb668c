// crates/tf_mesh/src/lib.rs

//! TetraFlow 网格层
//!
//! 提供无结构四面体网格的几何核心与拓扑派生：
//! - `geometry`: 单元雅可比、形函数梯度、面法向等纯几何函数
//! - `mesh`: 四面体网格容器（坐标、连接表、边界三角形）
//! - `derived`: 派生连接关系（点周单元、点周点、边、对偶面法向、节点体积）
//! - `faces`: 单元面连接关系（内部面左右单元、边界面、面邻居）
//! - `partition`: 网格分块与节点通信映射
//!
//! 网格在时间推进期间只读，所有派生量在初始化阶段一次性构建。

pub mod derived;
pub mod faces;
pub mod geometry;
pub mod mesh;
pub mod partition;

pub use derived::DerivedConnectivity;
pub use faces::FaceConnectivity;
pub use geometry::ElementGeometry;
pub use mesh::{BoundaryTri, TetMesh};
pub use partition::{CellChunk, MeshChunk};
