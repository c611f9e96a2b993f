// Links every compiled-in module crate so its `inventory` registration is
// picked up. Add new crates under ./modules here.
#![allow(unused_imports)]

use datamodel_basic as _;
use process_tools as _;
