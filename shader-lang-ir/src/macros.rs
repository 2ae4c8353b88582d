// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

macro_rules! impl_display_as_to_text {
    (<$g:lifetime> $ty:ty) => {
        impl<$g> std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Display::fmt(&crate::text::ToText::display(self), f)
            }
        }
    };
}
