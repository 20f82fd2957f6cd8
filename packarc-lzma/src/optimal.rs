//! The price-optimal parser.
//!
//! For each stretch of lookahead the parser fills a table of `Optimal`
//! records, one per byte offset, each holding the cheapest known way to
//! reach that offset plus the coder state and rep ring that way implies.
//! Offsets are relaxed forward with every successor the format offers:
//! literal, short rep, the four rep matches, new matches at every length,
//! and the two-step `literal-then-rep0` and `match-then-literal-then-rep0`
//! chains whose omission would still be legal but measurably less compact.
//! Once the table is closed, the back-links are reversed so the driver can
//! replay the chosen symbols forward.

use crate::coders::literal_price;
use crate::encoder::LzmaEncoder;
use crate::model::{MATCH_LEN_MAX, NUM_REPS, State};
use crate::range_coder::{self, INFINITY_PRICE};
use packarc_core::error::Result;
use std::io::Read;

/// Number of entries in the optimal-parse table.
pub const NUM_OPTS: usize = 1 << 12;

/// One slot of the optimal-parse table.
///
/// The contents are scratch state; nothing here survives between
/// `get_optimum` calls.
#[derive(Debug, Clone, Copy)]
pub struct Optimal {
    /// Cheapest known price to reach this offset, in 1/64-bit units.
    pub price: u32,
    /// Offset this slot was reached from.
    pub pos_prev: u32,
    /// Symbol used for the step: `u32::MAX` literal, `0..4` rep index,
    /// `dist + 4` new match.
    pub back_prev: u32,
    /// The step was a two-step chain ending in a literal before `pos_prev`.
    pub prev1_is_char: bool,
    /// The two-step chain additionally starts with a match at `pos_prev2`.
    pub prev2: bool,
    /// Start offset of the two-step chain.
    pub pos_prev2: u32,
    /// First symbol of the two-step chain.
    pub back_prev2: u32,
    /// Coder state implied by the path into this slot.
    pub state: State,
    /// Rep ring implied by the path into this slot.
    pub backs: [u32; NUM_REPS],
}

impl Optimal {
    pub(crate) fn make_as_char(&mut self) {
        self.back_prev = u32::MAX;
        self.prev1_is_char = false;
    }

    pub(crate) fn make_as_short_rep(&mut self) {
        self.back_prev = 0;
        self.prev1_is_char = false;
    }

    pub(crate) fn is_short_rep(&self) -> bool {
        self.back_prev == 0
    }
}

impl Default for Optimal {
    fn default() -> Self {
        Self {
            price: INFINITY_PRICE,
            pos_prev: 0,
            back_prev: 0,
            prev1_is_char: false,
            prev2: false,
            pos_prev2: 0,
            back_prev2: 0,
            state: State::new(),
            backs: [0; NUM_REPS],
        }
    }
}

impl LzmaEncoder {
    /// Choose the next symbol run starting at `position`.
    ///
    /// Returns `(len, back)`: `len == 1` with `back == u32::MAX` is a
    /// literal, `back < 4` a rep (len 1 meaning short rep), otherwise a new
    /// match at distance `back - 4`.
    pub(crate) fn get_optimum<R: Read>(
        &mut self,
        src: &mut R,
        mut position: u32,
    ) -> Result<(u32, u32)> {
        // Drain symbols queued by the previous table fill first.
        if self.opt_end != self.opt_cur {
            let len = self.optimum[self.opt_cur as usize].pos_prev - self.opt_cur;
            let back = self.optimum[self.opt_cur as usize].back_prev;
            self.opt_cur = self.optimum[self.opt_cur as usize].pos_prev;
            return Ok((len, back));
        }
        self.opt_cur = 0;
        self.opt_end = 0;

        let (len_main, num_pairs) = if self.longest_match_found {
            self.longest_match_found = false;
            (self.longest_match_len, self.num_dist_pairs)
        } else {
            self.read_match_distances(src)?
        };

        let mut num_avail = self.mf.num_available() + 1;
        if num_avail < 2 {
            return Ok((1, u32::MAX));
        }
        if num_avail > MATCH_LEN_MAX {
            num_avail = MATCH_LEN_MAX;
        }

        let mut reps = [0u32; NUM_REPS];
        let mut rep_lens = [0u32; NUM_REPS];
        let mut rep_max_index = 0usize;
        for i in 0..NUM_REPS {
            reps[i] = self.reps[i];
            rep_lens[i] = self.mf.get_match_len(-1, reps[i], num_avail);
            if rep_lens[i] > rep_lens[rep_max_index] {
                rep_max_index = i;
            }
        }

        // Fast-bytes shortcuts: a long enough match is taken on the spot.
        if rep_lens[rep_max_index] >= self.nice_len {
            let len = rep_lens[rep_max_index];
            self.move_ahead(src, len - 1)?;
            return Ok((len, rep_max_index as u32));
        }
        if len_main >= self.nice_len {
            let back = self.match_distances[num_pairs as usize - 1] + NUM_REPS as u32;
            self.move_ahead(src, len_main - 1)?;
            return Ok((len_main, back));
        }

        let mut current_byte = self.mf.get_index_byte(-1);
        let mut match_byte = self.mf.get_index_byte(-(self.reps[0] as i32) - 1 - 1);
        if len_main < 2 && current_byte != match_byte && rep_lens[rep_max_index] < 2 {
            return Ok((1, u32::MAX));
        }

        self.optimum[0].state = self.state;
        let mut pos_state = (position & self.props.pos_mask()) as usize;

        {
            let ctx = self.model.literal.context(position, self.prev_byte);
            self.optimum[1].price = range_coder::price0(
                self.model.is_match[self.state.index()][pos_state],
            ) + literal_price(
                &self.model.literal.probs[ctx],
                !self.state.is_char_state(),
                match_byte,
                current_byte,
            );
        }
        self.optimum[1].make_as_char();

        let match_price =
            range_coder::price1(self.model.is_match[self.state.index()][pos_state]);
        let rep_match_price =
            match_price + range_coder::price1(self.model.is_rep[self.state.index()]);

        if match_byte == current_byte {
            let short_rep_price = rep_match_price + self.rep_len1_price(self.state, pos_state);
            if short_rep_price < self.optimum[1].price {
                self.optimum[1].price = short_rep_price;
                self.optimum[1].make_as_short_rep();
            }
        }

        let mut len_end = len_main.max(rep_lens[rep_max_index]);
        if len_end < 2 {
            return Ok((1, self.optimum[1].back_prev));
        }
        self.optimum[1].pos_prev = 0;
        self.optimum[0].backs = reps;

        {
            let mut len = len_end;
            while len >= 2 {
                self.optimum[len as usize].price = INFINITY_PRICE;
                len -= 1;
            }
        }

        // Seed rep matches from offset 0.
        for i in 0..NUM_REPS {
            let mut rep_len = rep_lens[i];
            if rep_len < 2 {
                continue;
            }
            let price = rep_match_price + self.pure_rep_price(i as u32, self.state, pos_state);
            while rep_len >= 2 {
                let cur_and_len = price + self.rep_len_prices.price(rep_len, pos_state);
                let opt = &mut self.optimum[rep_len as usize];
                if cur_and_len < opt.price {
                    opt.price = cur_and_len;
                    opt.pos_prev = 0;
                    opt.back_prev = i as u32;
                    opt.prev1_is_char = false;
                }
                rep_len -= 1;
            }
        }

        // Seed new matches from offset 0; starting past rep0's reach since
        // the rep already covers the shorter lengths more cheaply.
        let normal_match_price =
            match_price + range_coder::price0(self.model.is_rep[self.state.index()]);
        let mut len = if rep_lens[0] >= 2 { rep_lens[0] + 1 } else { 2 };
        if len <= len_main {
            let mut offs = 0usize;
            while len > self.match_distances[offs] {
                offs += 2;
            }
            loop {
                let distance = self.match_distances[offs + 1];
                let cur_and_len = normal_match_price + self.pos_len_price(distance, len, pos_state);
                let opt = &mut self.optimum[len as usize];
                if cur_and_len < opt.price {
                    opt.price = cur_and_len;
                    opt.pos_prev = 0;
                    opt.back_prev = distance + NUM_REPS as u32;
                    opt.prev1_is_char = false;
                }
                if len == self.match_distances[offs] {
                    offs += 2;
                    if offs == num_pairs as usize {
                        break;
                    }
                }
                len += 1;
            }
        }

        // Forward relaxation.
        let mut cur = 0u32;
        loop {
            cur += 1;
            if cur == len_end {
                return Ok(self.backward(cur));
            }

            let (read_len, read_pairs) = self.read_match_distances(src)?;
            let mut new_len = read_len;
            let mut num_pairs = read_pairs;
            if new_len >= self.nice_len {
                self.num_dist_pairs = num_pairs;
                self.longest_match_len = new_len;
                self.longest_match_found = true;
                return Ok(self.backward(cur));
            }
            position += 1;

            // Reconstruct the state and rep ring implied by the best path
            // into `cur`.
            let mut pos_prev = self.optimum[cur as usize].pos_prev;
            let mut state;
            if self.optimum[cur as usize].prev1_is_char {
                pos_prev -= 1;
                if self.optimum[cur as usize].prev2 {
                    state = self.optimum[self.optimum[cur as usize].pos_prev2 as usize].state;
                    if self.optimum[cur as usize].back_prev2 < NUM_REPS as u32 {
                        state.update_rep();
                    } else {
                        state.update_match();
                    }
                } else {
                    state = self.optimum[pos_prev as usize].state;
                }
                state.update_char();
            } else {
                state = self.optimum[pos_prev as usize].state;
            }
            if pos_prev == cur - 1 {
                if self.optimum[cur as usize].is_short_rep() {
                    state.update_short_rep();
                } else {
                    state.update_char();
                }
                // A literal or short rep leaves the ring of the previous
                // offset untouched; `reps` still holds it.
            } else {
                let pos;
                if self.optimum[cur as usize].prev1_is_char && self.optimum[cur as usize].prev2 {
                    pos_prev = self.optimum[cur as usize].pos_prev2;
                    pos = self.optimum[cur as usize].back_prev2;
                    state.update_rep();
                } else {
                    pos = self.optimum[cur as usize].back_prev;
                    if pos < NUM_REPS as u32 {
                        state.update_rep();
                    } else {
                        state.update_match();
                    }
                }
                let prev = self.optimum[pos_prev as usize];
                if pos < NUM_REPS as u32 {
                    reps = match pos {
                        0 => [prev.backs[0], prev.backs[1], prev.backs[2], prev.backs[3]],
                        1 => [prev.backs[1], prev.backs[0], prev.backs[2], prev.backs[3]],
                        2 => [prev.backs[2], prev.backs[0], prev.backs[1], prev.backs[3]],
                        _ => [prev.backs[3], prev.backs[0], prev.backs[1], prev.backs[2]],
                    };
                } else {
                    reps = [
                        pos - NUM_REPS as u32,
                        prev.backs[0],
                        prev.backs[1],
                        prev.backs[2],
                    ];
                }
            }
            self.optimum[cur as usize].state = state;
            self.optimum[cur as usize].backs = reps;

            let cur_price = self.optimum[cur as usize].price;
            current_byte = self.mf.get_index_byte(-1);
            match_byte = self.mf.get_index_byte(-(reps[0] as i32) - 1 - 1);
            pos_state = (position & self.props.pos_mask()) as usize;

            let cur_and_1_price = cur_price
                + range_coder::price0(self.model.is_match[state.index()][pos_state])
                + {
                    let ctx = self
                        .model
                        .literal
                        .context(position, self.mf.get_index_byte(-2));
                    literal_price(
                        &self.model.literal.probs[ctx],
                        !state.is_char_state(),
                        match_byte,
                        current_byte,
                    )
                };

            let mut next_is_char = false;
            if cur_and_1_price < self.optimum[(cur + 1) as usize].price {
                let opt = &mut self.optimum[(cur + 1) as usize];
                opt.price = cur_and_1_price;
                opt.pos_prev = cur;
                opt.make_as_char();
                next_is_char = true;
            }

            let match_price = cur_price
                + range_coder::price1(self.model.is_match[state.index()][pos_state]);
            let rep_match_price =
                match_price + range_coder::price1(self.model.is_rep[state.index()]);

            {
                let next = self.optimum[(cur + 1) as usize];
                if match_byte == current_byte && !(next.pos_prev < cur + 1 && next.back_prev == 0)
                {
                    let short_rep_price = rep_match_price + self.rep_len1_price(state, pos_state);
                    if short_rep_price <= next.price {
                        let opt = &mut self.optimum[(cur + 1) as usize];
                        opt.price = short_rep_price;
                        opt.pos_prev = cur;
                        opt.make_as_short_rep();
                        next_is_char = true;
                    }
                }
            }

            let num_avail_full =
                (self.mf.num_available() + 1).min(NUM_OPTS as u32 - 1 - cur);
            let mut num_avail = num_avail_full;
            if num_avail < 2 {
                continue;
            }
            if num_avail > self.nice_len {
                num_avail = self.nice_len;
            }

            // literal-then-rep0 two-step.
            if !next_is_char && match_byte != current_byte {
                let t = (num_avail_full - 1).min(self.nice_len);
                let len_test2 = self.mf.get_match_len(0, reps[0], t);
                if len_test2 >= 2 {
                    let mut state2 = state;
                    state2.update_char();
                    let pos_state_next = ((position + 1) & self.props.pos_mask()) as usize;
                    let next_rep_match_price = cur_and_1_price
                        + range_coder::price1(
                            self.model.is_match[state2.index()][pos_state_next],
                        )
                        + range_coder::price1(self.model.is_rep[state2.index()]);
                    let offset = cur + 1 + len_test2;
                    while len_end < offset {
                        len_end += 1;
                        self.optimum[len_end as usize].price = INFINITY_PRICE;
                    }
                    let cur_and_len_price = next_rep_match_price
                        + self.rep_price(0, len_test2, state2, pos_state_next);
                    let opt = &mut self.optimum[offset as usize];
                    if cur_and_len_price < opt.price {
                        opt.price = cur_and_len_price;
                        opt.pos_prev = cur + 1;
                        opt.back_prev = 0;
                        opt.prev1_is_char = true;
                        opt.prev2 = false;
                    }
                }
            }

            let mut start_len = 2u32;

            // Rep matches from `cur`, each followed by the rep-then-literal-
            // then-rep0 chain.
            for rep_index in 0..NUM_REPS as u32 {
                let len_test_full =
                    self.mf.get_match_len(-1, reps[rep_index as usize], num_avail);
                if len_test_full < 2 {
                    continue;
                }
                let mut len_test = len_test_full;
                loop {
                    while len_end < cur + len_test {
                        len_end += 1;
                        self.optimum[len_end as usize].price = INFINITY_PRICE;
                    }
                    let cur_and_len_price = rep_match_price
                        + self.rep_price(rep_index, len_test, state, pos_state);
                    let opt = &mut self.optimum[(cur + len_test) as usize];
                    if cur_and_len_price < opt.price {
                        opt.price = cur_and_len_price;
                        opt.pos_prev = cur;
                        opt.back_prev = rep_index;
                        opt.prev1_is_char = false;
                    }
                    len_test -= 1;
                    if len_test < 2 {
                        break;
                    }
                }
                let len_test = len_test_full;

                if rep_index == 0 {
                    start_len = len_test + 1;
                }

                if len_test < num_avail_full {
                    let t = (num_avail_full - 1 - len_test).min(self.nice_len);
                    let len_test2 =
                        self.mf
                            .get_match_len(len_test as i32, reps[rep_index as usize], t);
                    if len_test2 >= 2 {
                        let mut state2 = state;
                        state2.update_rep();
                        let pos_state_next =
                            ((position + len_test) & self.props.pos_mask()) as usize;
                        let cur_and_len_char_price = rep_match_price
                            + self.rep_price(rep_index, len_test, state, pos_state)
                            + range_coder::price0(
                                self.model.is_match[state2.index()][pos_state_next],
                            )
                            + {
                                let ctx = self.model.literal.context(
                                    position + len_test,
                                    self.mf.get_index_byte(len_test as i32 - 1 - 1),
                                );
                                literal_price(
                                    &self.model.literal.probs[ctx],
                                    true,
                                    self.mf.get_index_byte(
                                        len_test as i32
                                            - 1
                                            - (reps[rep_index as usize] as i32 + 1),
                                    ),
                                    self.mf.get_index_byte(len_test as i32 - 1),
                                )
                            };
                        state2.update_char();
                        let pos_state_next =
                            ((position + len_test + 1) & self.props.pos_mask()) as usize;
                        let next_match_price = cur_and_len_char_price
                            + range_coder::price1(
                                self.model.is_match[state2.index()][pos_state_next],
                            );
                        let next_rep_match_price = next_match_price
                            + range_coder::price1(self.model.is_rep[state2.index()]);
                        let offset = len_test + 1 + len_test2;
                        while len_end < cur + offset {
                            len_end += 1;
                            self.optimum[len_end as usize].price = INFINITY_PRICE;
                        }
                        let cur_and_len_price = next_rep_match_price
                            + self.rep_price(0, len_test2, state2, pos_state_next);
                        let opt = &mut self.optimum[(cur + offset) as usize];
                        if cur_and_len_price < opt.price {
                            opt.price = cur_and_len_price;
                            opt.pos_prev = cur + len_test + 1;
                            opt.back_prev = 0;
                            opt.prev1_is_char = true;
                            opt.prev2 = true;
                            opt.pos_prev2 = cur;
                            opt.back_prev2 = rep_index;
                        }
                    }
                }
            }

            // New matches from `cur`.
            if new_len > num_avail {
                new_len = num_avail;
                num_pairs = 0;
                while new_len > self.match_distances[num_pairs as usize] {
                    num_pairs += 2;
                }
                self.match_distances[num_pairs as usize] = new_len;
                num_pairs += 2;
            }
            if new_len >= start_len {
                let normal_match_price = match_price
                    + range_coder::price0(self.model.is_rep[state.index()]);
                while len_end < cur + new_len {
                    len_end += 1;
                    self.optimum[len_end as usize].price = INFINITY_PRICE;
                }
                let mut offs = 0usize;
                while start_len > self.match_distances[offs] {
                    offs += 2;
                }
                let mut len_test = start_len;
                loop {
                    let cur_back = self.match_distances[offs + 1];
                    let cur_and_len_price = normal_match_price
                        + self.pos_len_price(cur_back, len_test, pos_state);
                    {
                        let opt = &mut self.optimum[(cur + len_test) as usize];
                        if cur_and_len_price < opt.price {
                            opt.price = cur_and_len_price;
                            opt.pos_prev = cur;
                            opt.back_prev = cur_back + NUM_REPS as u32;
                            opt.prev1_is_char = false;
                        }
                    }

                    if len_test == self.match_distances[offs] {
                        // match-then-literal-then-rep0 two-step.
                        if len_test < num_avail_full {
                            let t = (num_avail_full - 1 - len_test).min(self.nice_len);
                            let len_test2 =
                                self.mf.get_match_len(len_test as i32, cur_back, t);
                            if len_test2 >= 2 {
                                let mut state2 = state;
                                state2.update_match();
                                let pos_state_next =
                                    ((position + len_test) & self.props.pos_mask()) as usize;
                                let cur_and_len_char_price = cur_and_len_price
                                    + range_coder::price0(
                                        self.model.is_match[state2.index()][pos_state_next],
                                    )
                                    + {
                                        let ctx = self.model.literal.context(
                                            position + len_test,
                                            self.mf.get_index_byte(len_test as i32 - 1 - 1),
                                        );
                                        literal_price(
                                            &self.model.literal.probs[ctx],
                                            true,
                                            self.mf.get_index_byte(
                                                len_test as i32 - (cur_back as i32 + 1) - 1,
                                            ),
                                            self.mf.get_index_byte(len_test as i32 - 1),
                                        )
                                    };
                                state2.update_char();
                                let pos_state_next =
                                    ((position + len_test + 1) & self.props.pos_mask()) as usize;
                                let next_match_price = cur_and_len_char_price
                                    + range_coder::price1(
                                        self.model.is_match[state2.index()][pos_state_next],
                                    );
                                let next_rep_match_price = next_match_price
                                    + range_coder::price1(self.model.is_rep[state2.index()]);
                                let offset = len_test + 1 + len_test2;
                                while len_end < cur + offset {
                                    len_end += 1;
                                    self.optimum[len_end as usize].price = INFINITY_PRICE;
                                }
                                let two_step_price = next_rep_match_price
                                    + self.rep_price(0, len_test2, state2, pos_state_next);
                                let opt = &mut self.optimum[(cur + offset) as usize];
                                if two_step_price < opt.price {
                                    opt.price = two_step_price;
                                    opt.pos_prev = cur + len_test + 1;
                                    opt.back_prev = 0;
                                    opt.prev1_is_char = true;
                                    opt.prev2 = true;
                                    opt.pos_prev2 = cur;
                                    opt.back_prev2 = cur_back + NUM_REPS as u32;
                                }
                            }
                        }
                        offs += 2;
                        if offs == num_pairs as usize {
                            break;
                        }
                    }
                    len_test += 1;
                }
            }
        }
    }

    /// Reverse the back-link chain so the queued symbols replay forward.
    fn backward(&mut self, mut cur: u32) -> (u32, u32) {
        self.opt_end = cur;
        let mut pos_mem = self.optimum[cur as usize].pos_prev;
        let mut back_mem = self.optimum[cur as usize].back_prev;
        loop {
            if self.optimum[cur as usize].prev1_is_char {
                self.optimum[pos_mem as usize].make_as_char();
                self.optimum[pos_mem as usize].pos_prev = pos_mem - 1;
                if self.optimum[cur as usize].prev2 {
                    let pos_prev2 = self.optimum[cur as usize].pos_prev2;
                    let back_prev2 = self.optimum[cur as usize].back_prev2;
                    let first = &mut self.optimum[(pos_mem - 1) as usize];
                    first.prev1_is_char = false;
                    first.pos_prev = pos_prev2;
                    first.back_prev = back_prev2;
                }
            }
            let pos_prev = pos_mem;
            let back_cur = back_mem;
            back_mem = self.optimum[pos_prev as usize].back_prev;
            pos_mem = self.optimum[pos_prev as usize].pos_prev;
            self.optimum[pos_prev as usize].back_prev = back_cur;
            self.optimum[pos_prev as usize].pos_prev = cur;
            cur = pos_prev;
            if cur == 0 {
                break;
            }
        }
        self.opt_cur = self.optimum[0].pos_prev;
        (self.opt_cur, self.optimum[0].back_prev)
    }
}
