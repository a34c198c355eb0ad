use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};

use super::bounds::{BoundedStream, RowBounds};
use super::nested::{GroupKey, ObjectBuilder, RowMapper};
use super::row::DbRow;
use crate::driver::RowStream;
use crate::error::SqlMapperError;
use crate::mapping::ResultMap;
use crate::record::Record;

/// Lazy stream of mapped records.
pub type RecordStream = BoxStream<'static, Result<Record, SqlMapperError>>;

/// What feeding one input to a grouping stage produced.
#[derive(Debug)]
pub enum Step {
    /// A completed result
    Emit(Record),
    /// The input was absorbed into a pending result or kept as lookahead
    Deferred,
}

enum Input {
    Row(DbRow),
    End,
}

/// Grouping over rows that arrive ordered by group: at most one parent is pending.
struct OrderedGrouper {
    mapper: RowMapper,
    map: Arc<ResultMap>,
    pending: Option<(GroupKey, ObjectBuilder)>,
}

impl OrderedGrouper {
    fn accept(&mut self, input: Input) -> Result<Step, SqlMapperError> {
        let row = match input {
            Input::Row(row) => row,
            Input::End => return Ok(self.complete(None)),
        };
        let key = GroupKey::from_row(&self.map, &row, None);
        if let Some((pending_key, builder)) = &mut self.pending
            && *pending_key == key
        {
            builder.apply(&self.mapper, &self.map, &row, None)?;
            return Ok(Step::Deferred);
        }
        let next = ObjectBuilder::start(&self.mapper, &self.map, &row, None)?;
        Ok(self.complete(Some((key, next))))
    }

    /// Emit the pending parent, if any, and make `next` the pending one.
    fn complete(&mut self, next: Option<(GroupKey, ObjectBuilder)>) -> Step {
        let finished = std::mem::replace(&mut self.pending, next);
        match finished {
            Some((_, builder)) => Step::Emit(builder.finish(&self.map)),
            None => Step::Deferred,
        }
    }
}

/// Turns a driver row stream into a bounded stream of records.
///
/// Three modes, picked from the result map:
/// - flat: one row, one record;
/// - grouped and ordered: a parent is emitted as soon as a row with another key (or the end of
///   the rows) shows it is complete, so `K` parents need at most `K + 1` rows;
/// - grouped and unordered: every row is read before the first parent is emitted.
#[derive(Debug, Clone)]
pub struct ResultStreamAssembler {
    mapper: RowMapper,
}

impl ResultStreamAssembler {
    #[must_use]
    pub fn new(mapper: RowMapper) -> Self {
        Self { mapper }
    }

    #[must_use]
    pub fn assemble(
        &self,
        rows: RowStream,
        result_map: Option<Arc<ResultMap>>,
        result_ordered: bool,
        bounds: RowBounds,
    ) -> RecordStream {
        let records = match result_map {
            Some(map) if map.has_nested() && result_ordered => self.grouped_ordered(rows, map),
            Some(map) if map.has_nested() => self.grouped_unordered(rows, map),
            map => self.flat(rows, map),
        };
        BoundedStream::new(records, bounds).boxed()
    }

    fn flat(&self, rows: RowStream, map: Option<Arc<ResultMap>>) -> RecordStream {
        let mapper = self.mapper.clone();
        rows.map(move |row| row.and_then(|row| mapper.map_row(map.as_deref(), &row)))
            .boxed()
    }

    fn grouped_ordered(&self, rows: RowStream, map: Arc<ResultMap>) -> RecordStream {
        let mut grouper = OrderedGrouper {
            mapper: self.mapper.clone(),
            map,
            pending: None,
        };
        rows.map_ok(Input::Row)
            .chain(stream::once(async { Ok(Input::End) }))
            .map(move |input| input.and_then(|input| grouper.accept(input)))
            .try_filter_map(|step| async move {
                Ok(match step {
                    Step::Emit(record) => Some(record),
                    Step::Deferred => None,
                })
            })
            .boxed()
    }

    fn grouped_unordered(&self, mut rows: RowStream, map: Arc<ResultMap>) -> RecordStream {
        let mapper = self.mapper.clone();
        let collect = async move {
            let mut parents: Vec<ObjectBuilder> = Vec::new();
            let mut index: HashMap<GroupKey, usize> = HashMap::new();
            while let Some(row) = rows.next().await {
                let row = row?;
                let key = GroupKey::from_row(&map, &row, None);
                match index.get(&key) {
                    Some(&at) => parents[at].apply(&mapper, &map, &row, None)?,
                    None => {
                        index.insert(key, parents.len());
                        parents.push(ObjectBuilder::start(&mapper, &map, &row, None)?);
                    }
                }
            }
            Ok::<_, SqlMapperError>(
                parents
                    .into_iter()
                    .map(|parent| Ok::<_, SqlMapperError>(parent.finish(&map)))
                    .collect::<Vec<_>>(),
            )
        };
        stream::once(collect)
            .map_ok(stream::iter)
            .try_flatten()
            .boxed()
    }
}
