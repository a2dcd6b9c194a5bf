// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use serde_derive::{
    Deserialize,
    Serialize,
};

/// B+tree statistics for one database.
#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct DatabaseStat {
    pub page_size: usize,
    pub depth: usize,
    pub branch_pages: usize,
    pub leaf_pages: usize,
    pub overflow_pages: usize,
    pub entries: usize,
}

impl From<lmdb_sys::MDB_stat> for DatabaseStat {
    fn from(stat: lmdb_sys::MDB_stat) -> DatabaseStat {
        DatabaseStat {
            page_size: stat.ms_psize as usize,
            depth: stat.ms_depth as usize,
            branch_pages: stat.ms_branch_pages as usize,
            leaf_pages: stat.ms_leaf_pages as usize,
            overflow_pages: stat.ms_overflow_pages as usize,
            entries: stat.ms_entries as usize,
        }
    }
}

impl DatabaseStat {
    pub fn total_pages(&self) -> usize {
        self.branch_pages + self.leaf_pages + self.overflow_pages
    }
}
